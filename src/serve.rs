//! HTTP server for the live accordion preview
//!
//! `concertina serve` → renders the instance and drives it over a JSON API.
//! The embedded page wires title-button clicks to `/api/toggle` and
//! `hashchange` to `/api/navigate`, so both runtime triggers reach the same
//! engine the library exposes.

use crate::config::Mode;
use crate::dom::Document;
use crate::hash::{MemoryNavigator, Navigator};
use crate::instance::Accordion;
use crate::state::ItemState;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tiny_http::{Header, Method, Request, Response, Server};

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }
}

#[derive(Serialize)]
struct StateSnapshot {
    mode: Mode,
    fragment: Option<String>,
    items: Vec<ItemSnapshot>,
}

#[derive(Serialize)]
struct ItemSnapshot {
    id: String,
    title: String,
    state: ItemState,
    open: bool,
}

#[derive(Deserialize)]
struct ToggleQuery {
    id: String,
}

#[derive(Deserialize)]
struct NavigateQuery {
    #[serde(default)]
    fragment: String,
}

const PAGE_STYLE: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body { font-family: system-ui, -apple-system, sans-serif; background: #0d1117; color: #c9d1d9; max-width: 720px; margin: 0 auto; padding: 2rem 1rem; }
        .header { padding-bottom: 1rem; border-bottom: 1px solid #30363d; margin-bottom: 1rem; }
        .header h1 { font-size: 1.25rem; color: #58a6ff; }
        .header .fragment { font-size: 0.8rem; color: #8b949e; margin-top: 0.25rem; }
        .accordion-items-container { list-style: none; }
        .accordion-item__title-wrapper { font-size: 1rem; }
        .accordion-item__click-target { width: 100%; background: none; border: none; color: inherit; font: inherit; text-align: inherit; padding: 0.75rem 0.25rem; cursor: pointer; }
        .accordion-item__click-target .max-width-span { display: flex; justify-content: space-between; align-items: center; }
        .accordion-item__subtext { display: block; font-size: 0.75rem; color: #8b949e; }
        .accordion-item__dropdown { overflow: hidden; max-height: 0; transition: max-height 0.3s ease; }
        .accordion-item__description { padding: 0.25rem 0.25rem 1rem; color: #9da7b3; }
        .accordion-divider { border-bottom: 1px solid #30363d; }
        .accordion-item[data-is-open="true"] .accordion-icon-container { transform: rotate(45deg); }
        .accordion-icon-container { transition: transform 0.2s ease; font-weight: 600; }
        .plus { position: relative; width: 12px; height: 12px; }
        .plus__horizontal-line { position: absolute; top: 5px; width: 12px; height: 2px; background: #8b949e; }
        .plus__vertical-line { position: absolute; left: 5px; width: 2px; height: 12px; background: #8b949e; }
        .arrow { width: 8px; height: 8px; border-right: 2px solid #8b949e; border-bottom: 2px solid #8b949e; transform: rotate(45deg); }
"#;

const PAGE_SCRIPT: &str = r#"
        document.querySelectorAll('.accordion-item__click-target').forEach(btn => {
            btn.addEventListener('click', async () => {
                const item = btn.closest('[data-accordion-id]');
                if (!item) return;
                await fetch('/api/toggle?id=' + encodeURIComponent(item.dataset.accordionId));
                location.reload();
            });
        });
        window.addEventListener('hashchange', async () => {
            await fetch('/api/navigate?fragment=' + encodeURIComponent(location.hash.slice(1)));
            location.reload();
        });
"#;

/// Start the preview server. Blocks until the process is interrupted.
pub fn start_preview_server(
    port: u16,
    mut doc: Document,
    mut accordion: Accordion,
) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let mut nav = MemoryNavigator::new();

    eprintln!("\n\x1b[1;32mconcertina\x1b[0m");
    eprintln!("   Preview: http://localhost:{}", port);
    eprintln!("   Press Ctrl+C to stop\n");

    for request in server.incoming_requests() {
        // Settle any transition whose fallback deadline has passed.
        accordion.tick(&mut doc, Instant::now());
        if let Err(e) = handle_request(request, &mut doc, &mut accordion, &mut nav) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

fn handle_request(
    request: Request,
    doc: &mut Document,
    accordion: &mut Accordion,
    nav: &mut MemoryNavigator,
) -> std::io::Result<()> {
    let url = request.url().to_string();
    let mut parts = url.splitn(2, '?');
    let path = parts.next().unwrap_or("/");
    let query = parts.next().unwrap_or("");
    let method = request.method().clone();

    match (&method, path) {
        (&Method::Get, "/") => {
            let page = render_page(doc, accordion, nav);
            let response = Response::from_string(page)
                .with_header(Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]).unwrap());
            request.respond(response)
        }

        (&Method::Get, "/api/state") => respond_snapshot(request, accordion, nav),

        (&Method::Get, "/api/toggle") => {
            match serde_urlencoded::from_str::<ToggleQuery>(query) {
                Ok(q) => {
                    accordion.user_toggle(doc, nav, &q.id, Instant::now());
                }
                Err(e) => tracing::warn!(error = %e, "bad toggle query"),
            }
            respond_snapshot(request, accordion, nav)
        }

        (&Method::Get, "/api/navigate") => {
            match serde_urlencoded::from_str::<NavigateQuery>(query) {
                Ok(q) => {
                    nav.navigate_to(&q.fragment);
                    accordion.handle_navigation(doc, nav, Instant::now());
                }
                Err(e) => tracing::warn!(error = %e, "bad navigate query"),
            }
            respond_snapshot(request, accordion, nav)
        }

        _ => {
            let response = Response::from_string("Not found").with_status_code(404);
            request.respond(response)
        }
    }
}

fn respond_snapshot(
    request: Request,
    accordion: &Accordion,
    nav: &MemoryNavigator,
) -> std::io::Result<()> {
    let snapshot = snapshot(accordion, nav);
    let json = serde_json::to_string(&ApiResponse::success(snapshot))?;
    let response = Response::from_string(json).with_header(
        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
    );
    request.respond(response)
}

fn snapshot(accordion: &Accordion, nav: &MemoryNavigator) -> StateSnapshot {
    let titles: std::collections::HashMap<&str, &str> = accordion
        .items()
        .iter()
        .map(|item| (item.id.as_str(), item.title.as_str()))
        .collect();
    StateSnapshot {
        mode: accordion.config().mode,
        fragment: nav.fragment(),
        items: accordion
            .states()
            .into_iter()
            .map(|(id, state)| ItemSnapshot {
                title: titles.get(id.as_str()).unwrap_or(&"").to_string(),
                open: state.is_open(),
                id,
                state,
            })
            .collect(),
    }
}

/// Assemble the standalone preview page around the rendered instance.
pub fn render_page(doc: &Document, accordion: &Accordion, nav: &MemoryNavigator) -> String {
    let body = accordion.render(doc);
    let fragment = nav.fragment().unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
         <meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>concertina preview</title>\n\
         <style>{PAGE_STYLE}</style>\n</head>\n<body>\n\
         <div class=\"header\"><h1>concertina preview</h1>\
         <div class=\"fragment\">fragment: #{fragment}</div></div>\n\
         {body}\n\
         <script>{PAGE_SCRIPT}</script>\n</body>\n</html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{mount, MountOptions};
    use crate::slug::IdRegistry;
    use crate::source::{Collection, CollectionItem, CollectionSource, SourceError};
    use futures::future::BoxFuture;

    struct OneItem;

    impl CollectionSource for OneItem {
        fn fetch<'a>(&'a self, _source: &'a str) -> BoxFuture<'a, Result<Collection, SourceError>> {
            Box::pin(async {
                Ok(Collection {
                    items: vec![CollectionItem {
                        title: "Intro".to_string(),
                        subtitle: None,
                        body: "<p>hello</p>".to_string(),
                    }],
                    kind: "faq".to_string(),
                })
            })
        }
    }

    fn fixture() -> (Document, Accordion) {
        let mut doc = Document::new("body");
        let el = doc.create_element("div");
        doc.set_attr(el, "data-source", "faq");
        doc.append_child(doc.root(), el);
        let mut registry = IdRegistry::new();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let accordion = rt
            .block_on(mount(
                &mut doc,
                el,
                &mut registry,
                &OneItem,
                MountOptions::default(),
            ))
            .unwrap()
            .unwrap();
        (doc, accordion)
    }

    #[test]
    fn test_snapshot_shape() {
        let (_doc, accordion) = fixture();
        let nav = MemoryNavigator::new();
        let snap = snapshot(&accordion, &nav);
        assert_eq!(snap.items.len(), 1);
        assert_eq!(snap.items[0].id, "intro");
        assert_eq!(snap.items[0].title, "Intro");
        assert!(!snap.items[0].open);

        let json = serde_json::to_string(&ApiResponse::success(snap)).unwrap();
        assert!(json.contains("\"state\":\"closed\""));
    }

    #[test]
    fn test_rendered_page_embeds_the_instance() {
        let (doc, accordion) = fixture();
        let nav = MemoryNavigator::new();
        let page = render_page(&doc, &accordion, &nav);
        assert!(page.contains("data-accordion-id=\"intro\""));
        assert!(page.contains("/api/toggle"));
    }
}
