use html_app::{
    AppOptions, Document, Element, Event, EventTarget, HandlerDeclaration, HtmlApp, Result, bind,
};
use std::cell::RefCell;
use std::rc::Rc;

const PAGE_HTML: &str = r#"
<header><a id="home" href="/">home</a></header>
<div data-htmlapp="">
  <button data-ha="b1">B1</button>
  <button data-ha="b2"><span>B2</span></button>
  <button class="plain">plain</button>
</div>
"#;

type Calls = Rc<RefCell<Vec<&'static str>>>;

fn tracker(
    calls: &Calls,
    label: &'static str,
) -> impl Fn(&mut Event, Option<&Element>, &()) -> Result<()> + 'static {
    let calls = Rc::clone(calls);
    move |_: &mut Event, _: Option<&Element>, _: &()| {
        calls.borrow_mut().push(label);
        Ok(())
    }
}

fn child_declarations(calls: &Calls) -> Vec<HandlerDeclaration<()>> {
    vec![
        HandlerDeclaration::by_id("b1").on("onClick", tracker(calls, "h1")),
        HandlerDeclaration::by_id("b2").on("onClick", tracker(calls, "h2")),
        HandlerDeclaration::by_id("b2")
            .ignore_children(true)
            .on("onClick", tracker(calls, "h3")),
    ]
}

fn fixture() -> Result<(Document, Element, Calls)> {
    let doc = Document::from_html(PAGE_HTML)?;
    let root = doc
        .query_selector("[data-htmlapp]")?
        .ok_or_else(|| html_app::Error::SelectorNotFound("[data-htmlapp]".into()))?;
    Ok((doc, root, Rc::new(RefCell::new(Vec::new()))))
}

fn take(calls: &Calls) -> Vec<&'static str> {
    std::mem::take(&mut *calls.borrow_mut())
}

#[test]
fn child_handlers_fire_for_their_own_elements_only() -> Result<()> {
    let (doc, root, calls) = fixture()?;
    bind(&root, &child_declarations(&calls), ());

    doc.click("[data-ha=b1]")?;
    assert_eq!(take(&calls), vec!["h1"]);

    doc.click("[data-ha=b2]")?;
    assert_eq!(take(&calls), vec!["h2", "h3"]);

    doc.click(".plain")?;
    assert!(take(&calls).is_empty());
    Ok(())
}

#[test]
fn ignore_children_skips_descendant_origins() -> Result<()> {
    let (doc, root, calls) = fixture()?;
    bind(&root, &child_declarations(&calls), ());

    doc.click("[data-ha=b2] span")?;
    assert_eq!(take(&calls), vec!["h2"]);
    Ok(())
}

#[test]
fn root_handler_runs_after_child_handlers_in_declaration_order() -> Result<()> {
    let (doc, root, calls) = fixture()?;
    let mut declarations = child_declarations(&calls);
    declarations.push(HandlerDeclaration::root().on("onClick", tracker(&calls, "hr")));
    let binding = bind(&root, &declarations, ());
    assert_eq!(binding.root_listener_count(), 1);

    doc.click(".plain")?;
    assert_eq!(take(&calls), vec!["hr"]);

    doc.click("[data-ha=b1]")?;
    assert_eq!(take(&calls), vec!["h1", "hr"]);
    Ok(())
}

#[test]
fn document_handler_fires_anywhere_in_the_document() -> Result<()> {
    let (doc, root, calls) = fixture()?;
    let mut declarations = child_declarations(&calls);
    declarations.push(HandlerDeclaration::document().on("onClick", tracker(&calls, "hd")));
    let binding = bind(&root, &declarations, ());
    assert_eq!(binding.root_listener_count(), 1);
    assert_eq!(binding.document_listener_count(), 1);

    doc.click("#home")?;
    assert_eq!(take(&calls), vec!["hd"]);

    doc.click(".plain")?;
    assert_eq!(take(&calls), vec!["hd"]);

    doc.click("[data-ha=b1]")?;
    assert_eq!(take(&calls), vec!["h1", "hd"]);
    Ok(())
}

#[test]
fn listener_count_tracks_distinct_event_types() -> Result<()> {
    let (doc, root, calls) = fixture()?;
    let declarations = vec![
        HandlerDeclaration::by_id("b1")
            .on("onClick", tracker(&calls, "click"))
            .on("onKeyDown", tracker(&calls, "keydown"))
            .on("onKeyUp", tracker(&calls, "keyup")),
        HandlerDeclaration::by_id("b2").on("onKeyDown", tracker(&calls, "keydown-2")),
        HandlerDeclaration::root().on("onChange", tracker(&calls, "change")),
        HandlerDeclaration::document()
            .on("onClick", tracker(&calls, "doc-click"))
            .on("onScroll", tracker(&calls, "doc-scroll")),
    ];
    let binding = bind(&root, &declarations, ());

    assert_eq!(binding.root_listener_count(), 4);
    assert_eq!(binding.document_listener_count(), 2);
    assert_eq!(
        binding.event_types(),
        vec!["click", "keydown", "keyup", "change", "scroll"]
    );
    let document_node = EventTarget::Node(doc.document_node());
    assert_eq!(doc.listener_count(document_node, "scroll"), 1);
    assert_eq!(doc.listener_count(EventTarget::Node(root.node_id()), "scroll"), 0);

    doc.dispatch("[data-ha=b1]", "keydown")?;
    assert_eq!(take(&calls), vec!["keydown"]);
    doc.dispatch(".plain", "change")?;
    assert_eq!(take(&calls), vec!["change"]);
    Ok(())
}

#[test]
fn zero_declarations_attach_zero_listeners() -> Result<()> {
    let (doc, root, calls) = fixture()?;
    let binding = bind::<()>(&root, &[], ());
    assert!(binding.is_empty());

    for selector in ["[data-ha=b1]", "[data-ha=b2]", ".plain", "#home"] {
        doc.click(selector)?;
    }
    assert!(take(&calls).is_empty());
    assert_eq!(doc.listener_count(EventTarget::Node(root.node_id()), "click"), 0);
    Ok(())
}

#[test]
fn independent_apps_do_not_share_handlers() -> Result<()> {
    let doc = Document::from_html(
        r#"<div data-htmlapp="left"><button data-ha="go"></button></div>
           <div data-htmlapp="right"><button data-ha="go"></button></div>"#,
    )?;
    let calls: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let make = |name: &str| -> Result<HtmlApp> {
        let sink = Rc::clone(&calls);
        HtmlApp::new(
            &doc,
            AppOptions::default().app_name(name).handler(
                HandlerDeclaration::by_id("go").on("onClick", move |_, _, app: &HtmlApp| {
                    sink.borrow_mut()
                        .push(app.app_name().unwrap_or_default().to_string());
                    Ok(())
                }),
            ),
        )
    };
    let left = make("left")?;
    let right = make("right")?;
    doc.dispatch_window_event("load")?;

    left.get_el("go")
        .ok_or_else(|| html_app::Error::SelectorNotFound("go".into()))?
        .click()?;
    right
        .get_el("go")
        .ok_or_else(|| html_app::Error::SelectorNotFound("go".into()))?
        .click()?;
    assert_eq!(*calls.borrow(), vec!["left", "right"]);
    Ok(())
}
