use schemashift::changelog::RunFilter;
use schemashift::errors::ErrorKind;
use schemashift::executor::StringSink;
use schemashift::rollback::RollbackTarget;
use schemashift_int_test::test_util::{
    cleanup, create_table, create_test_context, run_test, users_changelog,
};

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_update_sql_renders_without_executing() {
    run_test(
        create_test_context,
        |ctx| {
            let shift = ctx.shift();
            let mut sink = StringSink::new();
            let report = shift.update_sql(&users_changelog(), &RunFilter::none(), &mut sink)?;
            assert_eq!(report.applied().len(), 2);

            let output = sink.into_string();
            assert!(output.contains("-- Changeset db/changelog.yaml::1::bob"));
            let create = output.find("CREATE TABLE users").unwrap();
            let alter = output.find("ALTER TABLE users ADD COLUMN email").unwrap();
            assert!(create < alter);

            assert!(!ctx.table_exists("users")?);
            assert!(shift.history()?.is_empty());
            assert!(shift.list_locks()?.is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_sql_skips_applied_changesets() {
    run_test(
        create_test_context,
        |ctx| {
            let shift = ctx.shift();
            let mut changelog = users_changelog();
            shift.update(&changelog, &RunFilter::none())?;

            changelog.push(create_table("3", "orders"));
            let mut sink = StringSink::new();
            shift.update_sql(&changelog, &RunFilter::none(), &mut sink)?;
            assert!(!sink.as_str().contains("CREATE TABLE users"));
            assert!(sink.as_str().contains("CREATE TABLE orders"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_future_rollback_preview() {
    run_test(
        create_test_context,
        |ctx| {
            let shift = ctx.shift();
            let mut changelog = vec![create_table("1", "a")];
            shift.update(&changelog, &RunFilter::none())?;
            changelog.push(create_table("2", "b"));
            changelog.push(create_table("3", "c"));

            let mut sink = StringSink::new();
            shift.rollback_sql(&changelog, &RollbackTarget::Future, &mut sink)?;
            let output = sink.as_str();
            assert!(output.find("DROP TABLE c").unwrap() < output.find("DROP TABLE b").unwrap());
            assert!(!output.contains("DROP TABLE a"));

            let err = shift
                .rollback(&changelog, &RollbackTarget::Future)
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            assert!(ctx.table_exists("a")?);
            Ok(())
        },
        cleanup,
    )
}
