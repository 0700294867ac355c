mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chatview_common::{EventBus, ThemeError, ThemeEvent};
use chatview_theme::{
    ContentRequest, ContentServer, SessionContent, SessionDelegate, ThemeSession,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use common::{loader, runtime_config, theme_root, wait_until, Adapter, FakePage, FakeSandbox};

struct Chat {
    name: &'static str,
}

impl SessionDelegate for Chat {
    fn property(&self, name: &str) -> Option<Value> {
        (name == "chatName").then(|| json!(self.name))
    }

    fn contents(&self, request: &ContentRequest) -> Option<SessionContent> {
        (request.path() == "/avatar.png").then(|| SessionContent {
            data: b"session avatar".to_vec(),
            content_type: "image/png".into(),
        })
    }
}

fn chat(name: &'static str) -> Arc<Chat> {
    Arc::new(Chat { name })
}

fn get(session: &ThemeSession, path: &str) -> ContentRequest {
    ContentRequest::get(format!("{path}?psiId={}", session.id()))
}

#[tokio::test]
async fn load_reports_success_exactly_once() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = calls.clone();
    let theme = loader
        .load("clean/default", move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result);
        })
        .unwrap();

    assert_eq!(rx.recv().await.unwrap(), Ok(()));
    assert!(theme.is_ready());
    assert_eq!(theme.name(), "Fake");
    assert_eq!(theme.html(), "<html>OK</html>");

    // A second report is ignored.
    let page = sandbox.page();
    page.call("srvLoader", "finishThemeLoading", vec![]);
    page.call("srvLoader", "errorThemeLoading", vec![json!("late")]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(theme.is_ready());
}

#[tokio::test]
async fn load_reports_after_handle_is_dropped() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox, runtime_config(100, 1_000));

    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let counter = calls.clone();
    let theme = loader
        .load("clean/default", move |result| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result);
        })
        .unwrap();
    drop(theme);

    assert_eq!(rx.recv().await.unwrap(), Ok(()));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn synchronous_page_reports_after_load_returns() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Immediate("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox, runtime_config(5_000, 1_000));

    let loading = Arc::new(AtomicBool::new(true));
    let flag = loading.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let theme = loader
        .load("clean/default", move |result| {
            let _ = tx.send((result, flag.load(Ordering::SeqCst)));
        })
        .unwrap();
    loading.store(false, Ordering::SeqCst);

    let (result, during_load) = rx.recv().await.unwrap();
    assert_eq!(result, Ok(()));
    assert!(!during_load);
    assert!(theme.is_ready());
    assert_eq!(theme.html(), "<html>OK</html>");
}

#[tokio::test]
async fn bridge_objects_and_scripts_precede_bootstrap() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));
    let theme = loader.load_async("clean/default").await.unwrap();

    assert_eq!(sandbox.pages().len(), 1);
    let page = sandbox.page();
    assert_eq!(
        page.host().names(),
        vec!["srvLoader".to_string(), "srvUtil".to_string()]
    );

    let names = page.script_names();
    assert_eq!(names.len(), 3);
    assert_eq!(names[0], "chatview-bridge");
    assert!(names[1].ends_with("util.js"));
    assert!(names[2].ends_with("adapter.js"));
    assert_eq!(theme.scripts().len(), 3);

    let docs = page.documents();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].contains(r#"define("srvLoader""#));
    assert!(docs[0].contains(r#""themeId":"clean/default""#));
    assert!(docs[0].contains("initPsiTheme().adapter.loadTheme()"));
}

#[tokio::test]
async fn unresolvable_theme_fails_synchronously() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));

    let called = Arc::new(AtomicUsize::new(0));
    let counter = called.clone();
    let err = loader
        .load("clean/missing", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap_err();
    assert_eq!(err, ThemeError::PathNotFound("chatview/clean/missing".into()));

    let err = loader.load("clean", |_| {}).unwrap_err();
    assert_eq!(err, ThemeError::InvalidId("clean".into()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert!(sandbox.pages().is_empty());
}

#[tokio::test]
async fn script_failure_reason_reaches_caller() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Fail("broken adapter".into()));
    let loader = loader(root.path(), sandbox, runtime_config(5_000, 1_000));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let theme = loader
        .load("clean/default", move |r| {
            let _ = tx.send(r);
        })
        .unwrap();
    assert_eq!(
        rx.recv().await.unwrap(),
        Err(ThemeError::ScriptFailure("broken adapter".into()))
    );
    assert!(!theme.is_ready());
    assert_eq!(theme.load_error().as_deref(), Some("broken adapter"));
}

#[tokio::test]
async fn silent_script_times_out() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Silent);
    let loader = loader(root.path(), sandbox.clone(), runtime_config(50, 1_000));

    let err = loader.load_async("clean/default").await.unwrap_err();
    assert_eq!(err, ThemeError::LoadTimeout(Duration::from_millis(50)));

    // A report after the timeout changes nothing.
    sandbox.page().call("srvLoader", "finishThemeLoading", vec![]);
}

#[tokio::test]
async fn missing_scripts_are_skipped() {
    let root = theme_root();
    std::fs::remove_file(root.path().join("chatview/util.js")).unwrap();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));
    loader.load_async("clean/default").await.unwrap();

    let names = sandbox.page().script_names();
    assert_eq!(names.len(), 2);
    assert!(names[1].ends_with("adapter.js"));
}

#[tokio::test]
async fn unreadable_script_fails_synchronously() {
    let root = theme_root();
    std::fs::write(root.path().join("chatview/clean/adapter.js"), [0xff, 0xfe, 0x00]).unwrap();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));

    let called = Arc::new(AtomicUsize::new(0));
    let counter = called.clone();
    let err = loader
        .load("clean/default", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap_err();
    assert!(matches!(err, ThemeError::Io(ref msg) if msg.contains("adapter.js")));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(called.load(Ordering::SeqCst), 0);
    assert!(sandbox.pages().is_empty());
}

#[tokio::test]
async fn static_theme_serves_root_and_404() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox, runtime_config(5_000, 1_000));
    let theme = loader.load_async("clean/default").await.unwrap();

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let session = ThemeSession::attach(theme, chat("room"), server.clone()).unwrap();

    let res = server.dispatch(&get(&session, "/")).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.content_type, "text/html;charset=utf-8");
    assert_eq!(res.body_text(), "<html>OK</html>");

    let res = server.dispatch(&get(&session, "/missing.png")).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn session_content_precedes_theme_files() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox, runtime_config(5_000, 1_000));
    let theme = loader.load_async("clean/default").await.unwrap();

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let session = ThemeSession::attach(theme, chat("room"), server.clone()).unwrap();

    let res = server.dispatch(&get(&session, "/avatar.png")).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, b"session avatar");

    // Sub-resource found through the page's Referer.
    let req = ContentRequest::get("/images/smile.png").with_header("Referer", session.url());
    let res = server.dispatch(&req).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.content_type, "image/png");
    assert_eq!(res.body, b"\x89PNG smile");
}

#[tokio::test]
async fn http_resource_path_prefixes_static_lookups() {
    let root = theme_root();
    common::write(
        &root.path().join("chatview/clean/default/res/style.css"),
        b"body {}",
    );
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));
    let theme = loader.load_async("clean/default").await.unwrap();
    sandbox
        .page()
        .call("srvLoader", "setHttpResourcePath", vec![json!("res")]);

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let session = ThemeSession::attach(theme, chat("room"), server.clone()).unwrap();
    let res = server.dispatch(&get(&session, "/style.css")).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.content_type, "text/css");
}

#[tokio::test]
async fn per_session_html_reaches_the_right_session() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::PerSession);
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));
    let theme = loader.load_async("clean/default").await.unwrap();
    assert!(theme.prepare_session_html());

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let a = ThemeSession::attach(theme.clone(), chat("alpha"), server.clone()).unwrap();
    let b = ThemeSession::attach(theme.clone(), chat("beta"), server.clone()).unwrap();

    let (req_a, req_b) = (get(&a, "/"), get(&b, "/"));
    let (ra, rb) = tokio::join!(server.dispatch(&req_a), server.dispatch(&req_b));
    assert_eq!(ra.status, 200);
    assert_eq!(ra.body_text(), format!("<html>{}:alpha</html>", a.id()));
    assert_eq!(rb.body_text(), format!("<html>{}:beta</html>", b.id()));

    // Sessions leave the registry once their html is delivered.
    assert!(theme.sessions().is_empty());
    let executed = sandbox.page().executed();
    assert!(executed
        .iter()
        .any(|s| s == &format!("psi.adapter.generateSessionHtml(\"{}\");", a.id())));
}

#[tokio::test]
async fn namespace_change_redirects_generation_calls() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Namespaced("chat".into()));
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));
    let theme = loader.load_async("clean/default").await.unwrap();
    assert_eq!(theme.js_namespace(), "chat");

    // Fixed once loading finished.
    let reply = sandbox
        .page()
        .call("srvUtil", "__setProperty", vec![json!("jsNamespace"), json!("late")]);
    assert_eq!(reply, Value::Null);
    assert_eq!(theme.js_namespace(), "chat");

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let session = ThemeSession::attach(theme, chat("x"), server.clone()).unwrap();
    let res = server.dispatch(&get(&session, "/")).await;
    assert_eq!(res.status, 200);
    assert!(sandbox.page().executed()[0].starts_with("chat.adapter.generateSessionHtml("));
}

#[tokio::test]
async fn duplicate_generation_conflicts_then_times_out() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::PerSessionSilent);
    let loader = loader(root.path(), sandbox, runtime_config(5_000, 150));
    let theme = loader.load_async("clean/default").await.unwrap();

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let session = ThemeSession::attach(theme.clone(), chat("x"), server.clone()).unwrap();

    let first = {
        let server = server.clone();
        let req = get(&session, "/");
        tokio::spawn(async move { server.dispatch(&req).await })
    };
    let id = session.id().clone();
    wait_until(|| theme.sessions().is_pending(&id)).await;

    let second = server.dispatch(&get(&session, "/")).await;
    assert_eq!(second.status, 409);

    let first = first.await.unwrap();
    assert_eq!(first.status, 504);
    assert!(!theme.sessions().is_pending(&id));
    assert!(!theme.sessions().is_registered(&id));
}

#[tokio::test]
async fn closing_the_view_cancels_generation() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::PerSessionSilent);
    let loader = loader(root.path(), sandbox, runtime_config(5_000, 5_000));
    let theme = loader.load_async("clean/default").await.unwrap();

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let session = ThemeSession::attach(theme.clone(), chat("x"), server.clone()).unwrap();
    let id = session.id().clone();

    let pending = {
        let server = server.clone();
        let req = get(&session, "/");
        tokio::spawn(async move { server.dispatch(&req).await })
    };
    wait_until(|| theme.sessions().is_pending(&id)).await;

    drop(session);
    let res = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .expect("cancelled well before the generation timeout")
        .unwrap();
    assert_eq!(res.status, 503);
    assert!(!server.is_registered(&id));
    assert!(!theme.sessions().is_registered(&id));
    assert!(!theme.sessions().is_pending(&id));

    // A late answer is dropped.
    assert!(!theme.sessions().complete_generation(&id, "late".into()));
}

#[tokio::test]
async fn released_session_is_declined() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox, runtime_config(5_000, 1_000));
    let theme = loader.load_async("clean/default").await.unwrap();

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let session = ThemeSession::attach(theme, chat("x"), server.clone()).unwrap();
    let req = get(&session, "/");
    drop(session);

    assert_eq!(server.dispatch(&req).await.status, 404);
}

#[tokio::test]
async fn sessions_need_a_ready_theme() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Silent);
    let loader = loader(root.path(), sandbox, runtime_config(5_000, 1_000));
    let theme = loader.load("clean/default", |_| {}).unwrap();

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let err = ThemeSession::attach(theme, chat("x"), server.clone()).unwrap_err();
    assert_eq!(err, ThemeError::NotReady("clean/default".into()));
    assert!(server.is_empty());
}

#[tokio::test]
async fn session_page_gets_theme_scripts_and_objects() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));
    let theme = loader.load_async("clean/default").await.unwrap();
    sandbox.page().call("srvLoader", "setTransparent", vec![]);

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let session = ThemeSession::attach(theme.clone(), chat("x"), server).unwrap();

    let view = FakePage::new(Adapter::Silent);
    session.setup_page(&view, loader.utility().clone()).unwrap();

    assert_eq!(
        view.host().names(),
        vec!["srvSession".to_string(), "srvUtil".to_string()]
    );
    assert_eq!(view.script_names(), sandbox.page().script_names());
    assert_eq!(view.urls(), vec![session.url()]);
    assert!(view.is_transparent());
}

#[tokio::test]
async fn cache_round_trip_through_the_wire() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::Static("<html>OK</html>".into()));
    let loader = loader(root.path(), sandbox.clone(), runtime_config(5_000, 1_000));
    let _theme = loader.load_async("clean/default").await.unwrap();
    let page = sandbox.page();

    page.call(
        "srvLoader",
        "saveFilesToCache",
        vec![json!({"smile": "images/smile.png", "none": "nope.png"})],
    );
    page.call("srvLoader", "toCache", vec![json!("tpl"), json!("<div/>")]);
    page.call("srvLoader", "toCache", vec![json!("tpl"), json!("<span/>")]);

    let multi = page.call(
        "srvUtil",
        "loadFromCacheMulti",
        vec![json!(["tpl", "none"])],
    );
    assert_eq!(multi, json!({"tpl": "<span/>", "none": null}));
    assert_eq!(
        page.call("srvUtil", "psiOption", vec![json!("options.ui.chat.avatars.show")]),
        json!("true")
    );
}

#[tokio::test]
async fn lifecycle_events_are_published() {
    let root = theme_root();
    let sandbox = FakeSandbox::new(Adapter::PerSession);
    let events = Arc::new(EventBus::new(16));
    let mut rx = events.subscribe();
    let loader = loader(root.path(), sandbox, runtime_config(5_000, 1_000)).with_events(events);
    let theme = loader.load_async("clean/default").await.unwrap();

    let server = Arc::new(ContentServer::new(common::SERVER_URL));
    let session = ThemeSession::attach(theme, chat("x"), server.clone()).unwrap();
    let id = session.id().clone();
    server.dispatch(&get(&session, "/")).await;
    drop(session);

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            ThemeEvent::ThemeLoaded {
                theme_id: "clean/default".into()
            },
            ThemeEvent::SessionRegistered(id.clone()),
            ThemeEvent::SessionHtmlReady(id.clone()),
            ThemeEvent::SessionUnregistered(id),
        ]
    );
}
