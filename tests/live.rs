use hickory_resolver::TokioAsyncResolver;
use viaspf::{check_host, Config, SpfResult};

/// Evaluate a well-known published policy against an address that is
/// certainly not authorised.
#[tokio::test]
#[ignore = "depends on live DNS records"]
async fn live_check_host() {
    let _ = tracing_subscriber::fmt::try_init();

    let resolver = TokioAsyncResolver::tokio(Default::default(), Default::default());

    let config = Config::default();

    // 192.0.2.0/24 is TEST-NET-1, never a legitimate Gmail sender.
    let result = check_host(
        &resolver,
        &config,
        "192.0.2.1".parse().unwrap(),
        "gmail.com",
        "someone@gmail.com",
    )
    .await
    .unwrap();

    assert_eq!(result.spf_result, SpfResult::SoftFail);
}
