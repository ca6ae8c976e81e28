use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_int_counter, register_int_gauge, CounterVec, IntCounter, IntGauge};

lazy_static! {
    pub static ref PROVISIONS_COUNTER: CounterVec = register_counter_vec!(
        "pgdrop_provisions_total",
        "Provisioning attempts by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref NAME_COLLISIONS_COUNTER: IntCounter = register_int_counter!(
        "pgdrop_name_collisions_total",
        "Provisioning attempts retried after a database or role name collision"
    ).unwrap();

    pub static ref COMPENSATIONS_COUNTER: CounterVec = register_counter_vec!(
        "pgdrop_compensations_total",
        "Compensating actions run after a failed provisioning attempt",
        &["action", "status"]
    ).unwrap();

    pub static ref TENANT_POOLS_GAUGE: IntGauge = register_int_gauge!(
        "pgdrop_tenant_pools",
        "Connection pools currently cached in the tenant pool registry"
    ).unwrap();

    pub static ref VERIFICATIONS_COUNTER: CounterVec = register_counter_vec!(
        "pgdrop_verifications_total",
        "Human-verification attempts by result",
        &["result"]
    ).unwrap();
}
