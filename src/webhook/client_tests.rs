//! Tests for `ReqwestClient`.
//!
//! Full request/response behavior against a live server is covered by
//! the end-to-end tests under `tests/`.

use super::*;

mod reqwest_client {
    use super::*;

    #[test]
    fn new_creates_client() {
        let client = ReqwestClient::new().unwrap();
        assert!(format!("{client:?}").contains("ReqwestClient"));
    }

    #[test]
    fn with_timeout_creates_client() {
        let client = ReqwestClient::with_timeout(std::time::Duration::from_millis(250));
        assert!(client.is_ok());
    }

    #[test]
    fn from_client_accepts_custom_client() {
        let custom = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap();
        let client = ReqwestClient::from_client(custom);

        let _ = format!("{client:?}");
    }

    #[test]
    fn client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReqwestClient>();
    }

    #[test]
    fn user_agent_names_the_crate() {
        assert!(USER_AGENT.starts_with("hookcast/"));
    }

    #[tokio::test]
    async fn request_to_closed_port_is_connection_error() {
        // Bind then drop a listener so the port is known to be closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = ReqwestClient::new().unwrap();
        let url = url::Url::parse(&format!("http://127.0.0.1:{port}/hook")).unwrap();

        let result = client.request(HttpRequest::post(url, Vec::new())).await;

        // Behind a proxy the proxy may answer with an error status instead.
        match result {
            Err(HttpError::Connection(_)) => {}
            Ok(resp) if !resp.is_success() => {}
            other => panic!("Expected connection error or proxy error response, got {other:?}"),
        }
    }
}
