use sqlx::{Executor, PgConnection};

use super::error::ProvisionError;
use crate::models::tenant::QuotaPolicy;

pub const CHECK_FUNCTION: &str = "check_database_size";
pub const ATTACH_FUNCTION: &str = "create_size_check_trigger_for_table";
pub const TABLE_TRIGGER: &str = "check_size_trigger";
pub const EVENT_TRIGGER: &str = "create_size_check_trigger_event";

/// Command tags that create a table. `SELECT INTO` is its own tag.
pub const TABLE_CREATING_TAGS: [&str; 3] = ["CREATE TABLE", "CREATE TABLE AS", "SELECT INTO"];

/// DDL making the size limit self-enforcing inside a tenant database, in
/// execution order. Re-running the whole list is safe.
///
/// Besides fixed names and tags, the only interpolated value is the limit,
/// rendered from a `u64`.
pub fn quota_statements(policy: &QuotaPolicy) -> Vec<String> {
    let limit = policy.limit_bytes;
    let tags = TABLE_CREATING_TAGS.map(|tag| format!("'{tag}'")).join(", ");
    vec![
        // --- Size check, fired once per statement ---
        format!(
            r#"CREATE OR REPLACE FUNCTION public.{CHECK_FUNCTION}() RETURNS TRIGGER AS $fn$
               DECLARE
                 db_size BIGINT;
               BEGIN
                 SELECT pg_database_size(current_database()) INTO db_size;
                 IF db_size > {limit} THEN
                   RAISE EXCEPTION 'Database size limit ({limit} bytes) exceeded. Current size: % bytes', db_size
                     USING ERRCODE = 'program_limit_exceeded';
                 END IF;
                 RETURN NULL;
               END;
               $fn$ LANGUAGE plpgsql"#
        ),
        // --- Attach helper; unqualified names land in public ---
        format!(
            r#"CREATE OR REPLACE FUNCTION public.{ATTACH_FUNCTION}(full_table_name text) RETURNS void AS $fn$
               DECLARE
                 parts       text[];
                 schema_name text;
                 table_name  text;
               BEGIN
                 parts := parse_ident(full_table_name);
                 IF array_length(parts, 1) = 1 THEN
                   schema_name := 'public';
                   table_name  := parts[1];
                 ELSE
                   schema_name := parts[array_length(parts, 1) - 1];
                   table_name  := parts[array_length(parts, 1)];
                 END IF;

                 EXECUTE format('DROP TRIGGER IF EXISTS {TABLE_TRIGGER} ON %I.%I', schema_name, table_name);
                 EXECUTE format(
                   'CREATE TRIGGER {TABLE_TRIGGER}
                      AFTER INSERT OR UPDATE OR DELETE ON %I.%I
                      FOR EACH STATEMENT
                      EXECUTE FUNCTION public.{CHECK_FUNCTION}()',
                   schema_name, table_name
                 );
               END;
               $fn$ LANGUAGE plpgsql"#
        ),
        // --- Bulk apply to tables that already exist ---
        format!(
            r#"CREATE OR REPLACE FUNCTION public.apply_size_check_to_all_tables() RETURNS void AS $fn$
               DECLARE
                 tbl text;
               BEGIN
                 FOR tbl IN
                   SELECT format('%I.%I', table_schema, table_name)
                   FROM information_schema.tables
                   WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
                     AND table_type = 'BASE TABLE'
                 LOOP
                   PERFORM public.{ATTACH_FUNCTION}(tbl);
                 END LOOP;
               END;
               $fn$ LANGUAGE plpgsql"#
        ),
        "SELECT public.apply_size_check_to_all_tables()".to_string(),
        // --- Future tables via event trigger ---
        format!(
            r#"CREATE OR REPLACE FUNCTION public.{EVENT_TRIGGER}() RETURNS event_trigger AS $fn$
               DECLARE
                 obj record;
               BEGIN
                 FOR obj IN
                   SELECT * FROM pg_event_trigger_ddl_commands()
                   WHERE command_tag IN ({tags})
                     AND object_type = 'table'
                 LOOP
                   PERFORM public.{ATTACH_FUNCTION}(obj.object_identity);
                 END LOOP;
               END;
               $fn$ LANGUAGE plpgsql"#
        ),
        format!("DROP EVENT TRIGGER IF EXISTS {EVENT_TRIGGER}"),
        format!(
            r#"CREATE EVENT TRIGGER {EVENT_TRIGGER}
               ON ddl_command_end
               WHEN TAG IN ({tags})
               EXECUTE FUNCTION public.{EVENT_TRIGGER}()"#
        ),
    ]
}

/// Install quota enforcement on `conn`, which must be connected to the tenant
/// database as a superuser (event triggers require it).
pub async fn install_quota_enforcement(
    conn: &mut PgConnection,
    policy: &QuotaPolicy,
) -> Result<(), ProvisionError> {
    for statement in quota_statements(policy) {
        Executor::execute(&mut *conn, sqlx::raw_sql(&statement))
            .await
            .map_err(|source| ProvisionError::QuotaInstallFailed { source })?;
    }
    tracing::debug!(limit_bytes = policy.limit_bytes, "quota enforcement installed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_rendered_into_check_function() {
        let statements = quota_statements(&QuotaPolicy::database(10 * 1024 * 1024));
        assert!(statements[0].contains("IF db_size > 10485760 THEN"));
        assert!(statements[0].contains("Current size: % bytes"));
    }

    #[test]
    fn triggers_are_statement_level() {
        let statements = quota_statements(&QuotaPolicy::database(1));
        let attach = &statements[1];
        assert!(attach.contains("FOR EACH STATEMENT"));
        assert!(!attach.contains("FOR EACH ROW"));
        assert!(attach.contains("AFTER INSERT OR UPDATE OR DELETE"));
    }

    #[test]
    fn identifiers_are_quoted_with_format() {
        let statements = quota_statements(&QuotaPolicy::database(1));
        assert!(statements[1].contains("parse_ident(full_table_name)"));
        assert!(statements[1].contains("%I.%I"));
        assert!(statements[2].contains("format('%I.%I', table_schema, table_name)"));
    }

    #[test]
    fn event_trigger_is_replaced_not_duplicated() {
        let statements = quota_statements(&QuotaPolicy::database(1));
        let drop_at = statements
            .iter()
            .position(|s| s.starts_with("DROP EVENT TRIGGER IF EXISTS"))
            .unwrap();
        let create_at = statements
            .iter()
            .position(|s| s.contains("CREATE EVENT TRIGGER"))
            .unwrap();
        assert!(drop_at < create_at);
        assert!(statements[create_at].contains("ON ddl_command_end"));
    }

    #[test]
    fn every_table_creating_command_is_watched() {
        let statements = quota_statements(&QuotaPolicy::database(1));
        let tags = "'CREATE TABLE', 'CREATE TABLE AS', 'SELECT INTO'";
        assert!(statements[4].contains(&format!("WHERE command_tag IN ({tags})")));
        assert!(statements[6].contains(&format!("WHEN TAG IN ({tags})")));
    }

    #[test]
    fn existing_tables_are_covered_before_the_event_trigger() {
        let statements = quota_statements(&QuotaPolicy::database(1));
        assert_eq!(statements[3], "SELECT public.apply_size_check_to_all_tables()");
        assert_eq!(statements.len(), 7);
    }
}
