use axum::body::Body;
use http::{
    Request, StatusCode,
    header::{ACCESS_CONTROL_ALLOW_METHODS, CONTENT_TYPE, SET_COOKIE},
};
use sockjs::{BoxError, Session, SockJsServer};

mod common;
use common::{body_text, echo_server, get, init, post, send, test_config};

#[tokio::test]
async fn test_xhr_polling_session() -> anyhow::Result<()> {
    init().await;
    let server = echo_server(test_config());
    let router = server.router();

    let response = post(&router, "/echo/000/abc/xhr", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[CONTENT_TYPE],
        "application/javascript; charset=UTF-8"
    );
    assert_eq!(response.headers()[SET_COOKIE], "JSESSIONID=dummy; Path=/");
    assert_eq!(body_text(response).await, "o\n");

    let response = post(&router, "/echo/000/abc/xhr_send", r#"["hello"]"#).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain; charset=UTF-8");
    assert!(body_text(response).await.is_empty());

    let response = post(&router, "/echo/000/abc/xhr", "").await;
    assert_eq!(body_text(response).await, "a[\"hello\"]\n");

    // nothing queued: answered with a heartbeat after the poll timeout
    let response = post(&router, "/echo/000/abc/xhr", "").await;
    assert_eq!(body_text(response).await, "h\n");

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_xhr_send_errors() -> anyhow::Result<()> {
    init().await;
    let router = echo_server(test_config()).router();

    let response = post(&router, "/echo/000/unknown/xhr_send", r#"["x"]"#).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[SET_COOKIE], "JSESSIONID=dummy; Path=/");

    assert_eq!(body_text(post(&router, "/echo/000/s/xhr", "").await).await, "o\n");

    let response = post(&router, "/echo/000/s/xhr_send", "").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Payload expected.");

    let response = post(&router, "/echo/000/s/xhr_send", "[\"x\"").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Broken JSON encoding.");
    Ok(())
}

#[tokio::test]
async fn test_invalid_ids_and_methods() -> anyhow::Result<()> {
    init().await;
    let server = echo_server(test_config());
    let router = server.router();

    for uri in ["/echo/0.0/abc/xhr", "/echo/000/a.b/xhr", "/echo/000/abc/unknown"] {
        let response = post(&router, uri, "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
    assert!(server.manager().is_empty().await);

    let response = get(&router, "/echo/000/abc/xhr").await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = send(
        &router,
        Request::options("/echo/000/abc/xhr_streaming").body(Body::empty())?,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], "OPTIONS, POST");
    Ok(())
}

#[tokio::test]
async fn test_second_poll_gets_another_connection_frame() -> anyhow::Result<()> {
    init().await;
    let router = echo_server(test_config()).router();
    assert_eq!(body_text(post(&router, "/echo/000/c/xhr", "").await).await, "o\n");

    // the first poll stays attached until its poll timeout
    let first = post(&router, "/echo/000/c/xhr", "").await;
    let second = post(&router, "/echo/000/c/xhr", "").await;
    assert_eq!(
        body_text(second).await,
        "c[2010,\"Another connection still open\"]\n"
    );
    assert_eq!(body_text(first).await, "h\n");

    // detached again: the session is still usable
    let third = post(&router, "/echo/000/c/xhr", "").await;
    assert_eq!(body_text(third).await, "h\n");
    Ok(())
}

#[tokio::test]
async fn test_server_close_then_not_found() -> anyhow::Result<()> {
    init().await;
    let server = SockJsServer::new(test_config(), |session: Session| async move {
        session.close(3000, "Go away!").await;
        Ok::<_, BoxError>(())
    });
    let router = server.router();
    assert_eq!(body_text(post(&router, "/echo/000/x/xhr", "").await).await, "o\n");
    assert_eq!(
        body_text(post(&router, "/echo/000/x/xhr", "").await).await,
        "c[3000,\"Go away!\"]\n"
    );
    let response = post(&router, "/echo/000/x/xhr", "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_jsonp_polling() -> anyhow::Result<()> {
    init().await;
    let router = echo_server(test_config()).router();

    let response = get(&router, "/echo/000/j/jsonp").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "\"callback\" parameter required");

    let response = get(&router, "/echo/000/j/jsonp?c=%28alert%29").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "invalid \"callback\" parameter");

    let response = get(&router, "/echo/000/j/jsonp?c=cb").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "/**/cb(\"o\");\r\n");

    let response = send(
        &router,
        Request::post("/echo/000/j/jsonp_send")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("d=%5B%22x%22%5D"))?,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");

    let response = post(&router, "/echo/000/j/jsonp_send", r#"["y"]"#).await;
    assert_eq!(body_text(response).await, "ok");
    // let the echo service queue both replies
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let response = get(&router, "/echo/000/j/jsonp?c=cb").await;
    assert_eq!(
        body_text(response).await,
        "/**/cb(\"a[\\\"x\\\",\\\"y\\\"]\");\r\n"
    );

    let response = send(
        &router,
        Request::post("/echo/000/j/jsonp_send")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("e=1"))?,
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Payload expected.");
    Ok(())
}

#[tokio::test]
async fn test_abandoned_poll_does_not_lose_messages() -> anyhow::Result<()> {
    init().await;
    let server = echo_server(test_config());
    let router = server.router();
    assert_eq!(body_text(post(&router, "/echo/000/gone/xhr", "").await).await, "o\n");

    // the client gives up on a pending poll before anything was queued
    let pending = post(&router, "/echo/000/gone/xhr", "").await;
    drop(pending);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let session = server.manager().get("gone", false).await?;
    assert!(!server.manager().is_acquired(&session).await);

    session.send("kept").await?;
    let response = post(&router, "/echo/000/gone/xhr", "").await;
    assert_eq!(body_text(response).await, "a[\"kept\"]\n");
    server.shutdown().await;
    Ok(())
}
