use node_session::AppError;

#[test]
fn display_prefixes_error_kind() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Transport("reset".into()), "transport: reset"),
        (AppError::Protocol("eof".into()), "protocol: eof"),
        (AppError::Command("nope".into()), "command: nope"),
        (AppError::NotFound("gpu".into()), "not found: gpu"),
        (AppError::NoData("gpu".into()), "no data: gpu"),
        (AppError::Update("dl".into()), "update: dl"),
        (AppError::Host("systemctl".into()), "host: systemctl"),
        (AppError::Io("disk".into()), "io: disk"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn toml_errors_convert_to_config() {
    let err: AppError = toml::from_str::<toml::Value>("= broken")
        .expect_err("invalid toml")
        .into();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn json_errors_convert_to_protocol() {
    let err: AppError = serde_json::from_str::<serde_json::Value>("{")
        .expect_err("invalid json")
        .into();
    assert!(matches!(err, AppError::Protocol(_)));
}

#[test]
fn io_errors_convert_to_io() {
    let err: AppError = std::io::Error::other("gone").into();
    assert!(matches!(err, AppError::Io(ref msg) if msg.contains("gone")));
}

#[tokio::test]
async fn http_errors_convert_to_transport() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err: AppError = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/session"))
        .send()
        .await
        .expect_err("nothing listens on the port")
        .into();
    assert!(matches!(err, AppError::Transport(_)), "got {err}");
}
