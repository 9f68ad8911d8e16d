mod support;

use std::time::Duration;

use serde_json::json;
use test_case::test_case;

use saucejs_common::{Framework, RunConfiguration};
use saucejs_runner::{Job, JobState, Method, RunError};
use support::{api, browser, config, FakeSauce, Script, PAGE};

#[tokio::test(start_paused = true)]
async fn job_resolves_and_interprets() {
    let sauce = FakeSauce::new().script(
        "chrome",
        Script {
            pending_polls: 2,
            ..Default::default()
        },
    );
    let config = config(vec![browser("Windows 7", "chrome", "31")]);
    let mut job = Job::new(api(sauce.clone()), &config, PAGE, &config.browsers[0]);

    job.start().await.unwrap();
    assert_eq!(job.state(), JobState::Submitted);
    assert_eq!(job.task_id(), Some("task-0"));
    assert!(job.id().is_none());

    let result = job.get_result().await.unwrap();
    assert_eq!(job.state(), JobState::Interpreted);
    assert!(result.passed);
    assert_eq!(result.test_page_url, PAGE);
    assert_eq!(result.job_id, format!("{:032x}", 1));
    assert_eq!(result.job_url, format!("https://saucelabs.com/tests/{:032x}", 1));
    assert_eq!(job.id(), Some(result.job_id.as_str()));
    assert_eq!(sauce.polls_for("chrome"), 3);
}

#[tokio::test(start_paused = true)]
async fn poll_budget_is_exact() {
    let sauce = FakeSauce::new().script(
        "chrome",
        Script {
            invalid_job_id: true,
            ..Default::default()
        },
    );
    let mut config = config(vec![browser("Windows 7", "chrome", "31")]);
    config.status_check_attempts = 3;
    let mut job = Job::new(api(sauce.clone()), &config, PAGE, &config.browsers[0]);

    job.start().await.unwrap();
    let started = tokio::time::Instant::now();
    let err = job.get_result().await.unwrap_err();

    assert!(matches!(err, RunError::PollTimeout { attempts: 3, interval_ms: 1000 }));
    assert_eq!(sauce.polls_for("chrome"), 3);
    // two sleeps separate three polls
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(2000) && elapsed < Duration::from_millis(3000));
    assert!(job.id().is_none());
}

#[tokio::test(start_paused = true)]
async fn non_positive_budget_polls_until_complete() {
    let sauce = FakeSauce::new().script(
        "chrome",
        Script {
            pending_polls: 250,
            ..Default::default()
        },
    );
    let mut config = config(vec![browser("Windows 7", "chrome", "31")]);
    config.status_check_attempts = 0;
    let mut job = Job::new(api(sauce.clone()), &config, PAGE, &config.browsers[0]);

    job.start().await.unwrap();
    assert!(job.get_result().await.unwrap().passed);
    assert_eq!(sauce.polls_for("chrome"), 251);
}

#[tokio::test(start_paused = true)]
async fn transport_errors_count_as_polls() {
    let sauce = FakeSauce::new().script(
        "chrome",
        Script {
            poll_errors: 2,
            ..Default::default()
        },
    );
    let mut config = config(vec![browser("Windows 7", "chrome", "31")]);
    config.status_check_attempts = 3;
    let mut job = Job::new(api(sauce.clone()), &config, PAGE, &config.browsers[0]);

    job.start().await.unwrap();
    assert!(job.get_result().await.unwrap().passed);
    assert_eq!(sauce.polls_for("chrome"), 3);

    let sauce = FakeSauce::new().script(
        "chrome",
        Script {
            poll_errors: 3,
            ..Default::default()
        },
    );
    let mut job = Job::new(api(sauce), &config, PAGE, &config.browsers[0]);
    job.start().await.unwrap();
    assert!(matches!(job.get_result().await, Err(RunError::PollTimeout { attempts: 3, .. })));
}

#[tokio::test(start_paused = true)]
async fn missing_task_id_is_a_submission_error() {
    let sauce = FakeSauce::new().script(
        "chrome",
        Script {
            reject_submission: true,
            ..Default::default()
        },
    );
    let config = config(vec![browser("Windows 7", "chrome", "31")]);
    let mut job = Job::new(api(sauce.clone()), &config, PAGE, &config.browsers[0]);

    assert!(matches!(job.start().await, Err(RunError::Submission(_))));
    assert_eq!(job.state(), JobState::Created);
    assert_eq!(sauce.count(Method::Post, "/js-tests/status"), 0);
}

#[test_case(Framework::Jasmine; "jasmine")]
#[test_case(Framework::Qunit; "qunit")]
#[test_case(Framework::Mocha; "mocha")]
#[test_case(Framework::YuiTest; "yui test")]
#[test_case(Framework::Custom; "custom")]
#[tokio::test(start_paused = true)]
async fn null_result_fails_the_job(framework: Framework) {
    let sauce = FakeSauce::new().script(
        "chrome",
        Script {
            results: vec![serde_json::Value::Null],
            ..Default::default()
        },
    );
    let config = RunConfiguration {
        framework,
        ..config(vec![browser("Windows 7", "chrome", "31")])
    };
    let mut job = Job::new(api(sauce), &config, PAGE, &config.browsers[0]);

    job.start().await.unwrap();
    let result = job.get_result().await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.status.result, None);
}

#[tokio::test(start_paused = true)]
async fn test_error_status_is_an_error() {
    let sauce = FakeSauce::new().script(
        "chrome",
        Script {
            status: Some("test error".to_string()),
            ..Default::default()
        },
    );
    let config = config(vec![browser("Windows 7", "chrome", "31")]);
    let mut job = Job::new(api(sauce), &config, PAGE, &config.browsers[0]);

    job.start().await.unwrap();
    let err = job.get_result().await.unwrap_err();
    assert!(matches!(err, RunError::TestError(_)));
    assert!(err.to_string().starts_with("Test Error: "));
}

#[tokio::test(start_paused = true)]
async fn admin_calls_target_the_remote_job() {
    let sauce = FakeSauce::new();
    let config = config(vec![browser("Windows 7", "chrome", "31")]);
    let mut job = Job::new(api(sauce.clone()), &config, PAGE, &config.browsers[0]);

    job.start().await.unwrap();
    let result = job.get_result().await.unwrap();

    job.stop().await.unwrap();
    job.delete().await.unwrap();
    job.override_verdict(false).await.unwrap();

    let base = format!("https://saucelabs.test/rest/v1/builder/jobs/{}", result.job_id);
    let requests = sauce.requests();
    let admin: Vec<_> = requests.iter().filter(|r| r.url.contains("/jobs/")).collect();
    assert_eq!(admin.len(), 3);
    assert_eq!((admin[0].method, admin[0].url.clone()), (Method::Put, format!("{}/stop", base)));
    assert_eq!((admin[1].method, admin[1].url.clone()), (Method::Delete, base.clone()));
    assert_eq!((admin[2].method, admin[2].url.clone()), (Method::Put, base));
    assert_eq!(admin[2].body, Some(json!({"passed": false})));
}
