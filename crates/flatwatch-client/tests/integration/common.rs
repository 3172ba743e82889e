use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Html;
use axum::routing::get;
use tokio::net::TcpListener;

pub const LISTING_HTML: &str = r#"<html><body>
<p>Seite 1 von 1</p>
<ul>
  <li><a href="/offer/101">Altbau</a></li>
  <li><a href="/offer/102">Neubau</a></li>
</ul>
</body></html>"#;

pub const EMPTY_HTML: &str =
    "<html><body><p>Zur Zeit sind leider keine passenden Angebote verfügbar</p></body></html>";

async fn offer(Path(id): Path<u32>) -> Html<String> {
    Html(format!(
        r#"<html><body><h1 class="title"> Wohnung {id} </h1>
<dl><dt>Zimmer:</dt><dd>{rooms}</dd><dt>Warmmiete:</dt><dd>{rent} €</dd></dl>
<script>window.nonce = "{id}";</script>
</body></html>"#,
        rooms = id % 10,
        rent = 700 + id,
    ))
}

async fn browser_only(headers: HeaderMap) -> (StatusCode, Html<&'static str>) {
    let is_browser = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ua| ua.starts_with("Mozilla/"));
    if is_browser {
        (StatusCode::OK, Html(LISTING_HTML))
    } else {
        (StatusCode::FORBIDDEN, Html("go away"))
    }
}

/// Serves fixture pages on an ephemeral port and returns the base URL.
///
/// The server task lives until the test runtime shuts down.
pub async fn spawn_fixture_server() -> String {
    let app = Router::new()
        .route("/list", get(|| async { Html(LISTING_HTML) }))
        .route("/empty", get(|| async { Html(EMPTY_HTML) }))
        .route("/offer/{id}", get(offer))
        .route("/browser-only", get(browser_only))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .route(
            "/static",
            get(|| async {
                Html(r#"<html><head><script>var t = Date.now();</script></head><body><p>Eine freie Wohnung in Pankow</p></body></html>"#)
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
