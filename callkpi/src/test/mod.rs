use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;

use crate::Application;
use crate::config::TenantConfig;
use crate::runner::CONSOLIDATED_REPORT_FILE;
use crate::test_utils::{CallFixture, MessageFixture, create_test_config, insert_call, insert_message, setup_test_pool, ts};

async fn seed(pool: &sqlx::SqlitePool) {
    let calls = [
        CallFixture::new("CA1", "Garage Test", "2026-01-05 09:00:00").status("completed").duration(30).from_number("+33600000001"),
        CallFixture::new("CA2", "Garage Test", "2026-01-05 10:00:00").status("completed").duration(0).from_number("+33600000001"),
        CallFixture::new("CA3", "Garage Test", "2026-01-06 11:00:00").status("missed").duration(-1).from_number("+33600000002").voicemail(),
        CallFixture::new("CA4", "Garage Test", "2026-01-07T12:00:00").status("missed").duration(90).voicemail(),
        // Outside January
        CallFixture::new("CA5", "Garage Test", "2026-02-01 00:00:00").status("missed"),
        CallFixture::new("CA6", "Garage Martin", "2026-01-10 08:00:00").status("no-answer"),
    ];
    for call in &calls {
        insert_call(pool, call).await;
    }

    insert_message(
        pool,
        &MessageFixture::new("CA3", "Garage Test", "2026-01-06 11:01:00")
            .analysis(r#"{"motive_legend":"oil_change","is_urgent":true,"name":"Jean"}"#)
            .sent_at("2026-01-06 11:02:00"),
    )
    .await;
    insert_message(pool, &MessageFixture::new("CA4", "Garage Test", "2026-01-07 12:01:00").analysis("")).await;
}

fn report_time() -> NaiveDateTime {
    ts("2026-02-01 08:00:00")
}

/// Full run against SQLite: aggregation, HTML and Markdown output, file-transport delivery
#[test_log::test(tokio::test)]
async fn test_e2e_report_run() {
    let pool = setup_test_pool().await;
    seed(&pool).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.tenants.push(TenantConfig {
        display_name: Some("Garage Martin & Fils".to_string()),
        to_email: Some("martin@example.com".to_string()),
        ..TenantConfig::discovered("Garage Martin")
    });

    let app = Application::new_with_pool(config, pool).unwrap();
    let summary = app.runner().run_at(report_time(), CancellationToken::new()).await.unwrap();

    assert!(summary.is_success(), "{:?}", summary.failures);
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.skipped, 0);

    let emails = std::fs::read_dir(dir.path().join("emails"))
        .unwrap()
        .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "eml"))
        .count();
    assert_eq!(emails, 2);

    let markdown = std::fs::read_to_string(dir.path().join("rapports").join(CONSOLIDATED_REPORT_FILE)).unwrap();
    for line in [
        "## 📊 Rapport KPI - Garage Test",
        "| **Total d'appels reçus** | 4 |",
        "| Appels répondus | 2 |",
        "| Appels manqués | 2 |",
        "| Appels avec message vocal | 2 |",
        "| **Taux de réponse** | 50.0% |",
        "| **Taux de message** | 50.0% |",
        "| Durée moyenne d'appel | 60.0s |",
        "| Appelants uniques | 2 |",
        "| **Total messages traités** | 2 |",
        "| Emails envoyés | 1 |",
        "| Appels urgents | 1 |",
        "| Noms détectés | 1 |",
        "| 1 | Oil_Change | 1 |",
        "## 📊 Rapport KPI - Garage Martin & Fils",
    ] {
        assert!(markdown.contains(line), "missing {line:?} in:\n{markdown}");
    }

    let html = std::fs::read_to_string(dir.path().join("rapports/Garage_Martin_Janvier.html")).unwrap();
    assert!(html.contains("<h2>Garage Martin &amp; Fils</h2>"));

    app.shutdown().await;
}

/// A store whose schema is missing fails every job but still produces a summary
#[test_log::test(tokio::test)]
async fn test_e2e_missing_schema() {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let app = Application::new_with_pool(config, pool).unwrap();

    let summary = app.runner().run_at(report_time(), CancellationToken::new()).await.unwrap();

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].kind, "data_access");
    assert!(summary.reports_written.is_empty());

    let check = app.self_check().await;
    assert!(!check.is_healthy());
    assert!(check.tenants.is_err());
}
