use std::cell::RefCell;
use std::rc::Rc;

use rigging_core::{
    CollectionView, CollectionViewBuilder, Dom, ObjectRecord, Record, RecordSet, RecordStore,
    Renderer, Template, TemplateRegistry, ViewBuilder, ViewError, ViewEvent, ViewObject,
};
use rigging_dom::MemoryDom;

fn setup() -> (Rc<MemoryDom>, Rc<dyn Dom>, Renderer) {
    let _ = env_logger::builder().is_test(true).try_init();
    let dom = Rc::new(MemoryDom::new());
    let dyn_dom: Rc<dyn Dom> = dom.clone();
    let renderer = Renderer::new(Rc::new(TemplateRegistry::new()));
    (dom, dyn_dom, renderer)
}

fn foo_record(value: &str) -> Rc<dyn Record> {
    Rc::new(ObjectRecord::from_pairs([("foo", value)]))
}

fn numbered(value: &str) -> Rc<dyn Record> {
    Rc::new(ObjectRecord::from_pairs([("n", value)]))
}

fn span_children(
    dyn_dom: &Rc<dyn Dom>,
    renderer: &Renderer,
    store: &Rc<RecordStore>,
    field: &str,
) -> CollectionViewBuilder {
    let records: Rc<dyn RecordSet> = store.clone();
    CollectionViewBuilder::new(dyn_dom.clone(), records).child_template(
        renderer.clone(),
        Template::inline(&format!("{{{{{}}}}}", field)),
        "span",
    )
}

fn event_log(view: &Rc<CollectionView>) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    view.events()
        .on(move |event: &ViewEvent| sink.borrow_mut().push(event.name()));
    log
}

#[test]
fn test_render_two_records_batches_one_append() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    store.add(foo_record("bar"));
    store.add(foo_record("baz"));

    let view = span_children(&dyn_dom, &renderer, &store, "foo").build();
    view.render().unwrap();

    assert_eq!(
        dom.inner_html(view.el()),
        "<span>bar</span><span>baz</span>"
    );
    assert_eq!(dom.append_count(view.el()), 1);
    assert_eq!(view.container().len(), 2);
}

#[test]
fn test_added_record_appends_one_child_and_bubbles_render_once() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    store.add(foo_record("bar"));
    store.add(foo_record("baz"));

    let view = span_children(&dyn_dom, &renderer, &store, "foo").build();
    view.render().unwrap();
    let log = event_log(&view);

    let qux = foo_record("qux");
    store.add(qux.clone());

    assert_eq!(view.container().len(), 3);
    assert_eq!(view.container().find_by_index(2).unwrap().id(), qux.id());
    assert_eq!(dom.text_content(view.el()), "barbazqux");
    let renders = log
        .borrow()
        .iter()
        .filter(|name| name.as_str() == "childview:render")
        .count();
    assert_eq!(renders, 1);
}

#[test]
fn test_removed_record_destroys_exactly_its_child() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    let bar = foo_record("bar");
    store.add(bar.clone());
    store.add(foo_record("baz"));
    store.add(foo_record("qux"));

    let view = span_children(&dyn_dom, &renderer, &store, "foo").build();
    view.render().unwrap();
    let doomed = view.container().find_by_id(bar.id()).unwrap().view.clone();

    store.remove(bar.id());

    assert!(doomed.flags().is_destroyed());
    assert_eq!(view.container().len(), 2);
    assert_eq!(dom.text_content(view.el()), "bazqux");
    // Remaining children are re-indexed from zero.
    assert_eq!(view.container().find_by_index(0).unwrap().index.get(), 0);
    assert_eq!(view.container().find_by_index(1).unwrap().index.get(), 1);
}

#[test]
fn test_empty_view_shown_at_zero_records() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());

    let empty_dom = dyn_dom.clone();
    let empty_renderer = renderer.clone();
    let view = span_children(&dyn_dom, &renderer, &store, "foo")
        .empty_view(move || {
            Ok(ViewBuilder::new(empty_dom.clone(), empty_renderer.clone())
                .tag("p")
                .template(Template::inline("nothing here"))
                .build() as Rc<dyn ViewObject>)
        })
        .build();

    view.render().unwrap();

    assert!(view.current_empty_view().is_some());
    assert_eq!(view.container().len(), 0);
    assert_eq!(dom.inner_html(view.el()), "<p>nothing here</p>");
}

#[test]
fn test_empty_view_displaced_by_first_child_and_restored_on_last_removal() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());

    let empty_dom = dyn_dom.clone();
    let empty_renderer = renderer.clone();
    let view = span_children(&dyn_dom, &renderer, &store, "foo")
        .empty_view(move || {
            Ok(ViewBuilder::new(empty_dom.clone(), empty_renderer.clone())
                .tag("p")
                .template(Template::inline("nothing here"))
                .build() as Rc<dyn ViewObject>)
        })
        .build();
    view.render().unwrap();
    let placeholder = view.current_empty_view().unwrap();

    let bar = foo_record("bar");
    store.add(bar.clone());

    assert!(placeholder.flags().is_destroyed());
    assert!(view.current_empty_view().is_none());
    assert_eq!(dom.inner_html(view.el()), "<span>bar</span>");

    store.remove(bar.id());

    assert!(view.current_empty_view().is_some());
    assert_eq!(view.container().len(), 0);
    assert_eq!(dom.inner_html(view.el()), "<p>nothing here</p>");
}

#[test]
fn test_comparator_orders_interleaved_adds() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    store.add(numbered("1"));
    store.add(numbered("6"));

    let view = span_children(&dyn_dom, &renderer, &store, "n")
        .comparator(|a, b| a.get("n").cmp(&b.get("n")))
        .build();
    view.render().unwrap();

    store.add_at(numbered("2"), 1);
    store.add_at(numbered("5"), 1);
    store.add_at(numbered("3"), 2);
    store.add_at(numbered("4"), 2);

    assert_eq!(dom.text_content(view.el()), "123456");
    assert_eq!(view.container().len(), 6);
}

#[test]
fn test_destroy_teardown_and_idempotence() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    store.add(foo_record("bar"));
    store.add(foo_record("baz"));

    let view = span_children(&dyn_dom, &renderer, &store, "foo").build();
    view.render().unwrap();
    let log = event_log(&view);

    view.destroy();

    assert_eq!(view.container().len(), 0);
    assert!(dom.child_nodes(view.el()).is_empty());
    assert!(view.flags().is_destroyed());

    view.destroy();

    let destroys = log
        .borrow()
        .iter()
        .filter(|name| name.as_str() == "destroy")
        .count();
    assert_eq!(destroys, 1);
    assert_eq!(view.render(), Err(ViewError::AlreadyDestroyed));
}

#[test]
fn test_reset_reproduces_the_same_markup() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    store.add(foo_record("bar"));
    store.add(foo_record("baz"));

    let view = span_children(&dyn_dom, &renderer, &store, "foo").build();
    view.render().unwrap();
    let first_pass = dom.inner_html(view.el());

    store.reset(store.records());

    assert_eq!(dom.inner_html(view.el()), first_pass);
    assert_eq!(view.container().len(), 2);
}

#[test]
fn test_filter_excludes_records_on_render_and_add() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    store.add(numbered("1"));
    store.add(numbered("4"));
    store.add(numbered("2"));

    let view = span_children(&dyn_dom, &renderer, &store, "n")
        .filter(|record, _index| record.get("n").map_or(false, |n| n < "3".to_owned()))
        .build();
    view.render().unwrap();

    assert_eq!(dom.text_content(view.el()), "12");
    assert_eq!(view.container().len(), 2);

    store.add(numbered("9"));
    assert_eq!(view.container().len(), 2);

    store.add_at(numbered("0"), 0);
    assert_eq!(dom.text_content(view.el()), "012");
}

#[test]
fn test_sort_moves_elements_without_recreating_children() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    let two = numbered("2");
    let one = numbered("1");
    let three = numbered("3");
    store.add(two.clone());
    store.add(one.clone());
    store.add(three.clone());

    let view = span_children(&dyn_dom, &renderer, &store, "n").build();
    view.render().unwrap();
    let el_of = |record: &Rc<dyn Record>| {
        view.container().find_by_id(record.id()).unwrap().view.el()
    };
    let before = (el_of(&one), el_of(&two), el_of(&three));

    store.sort_by(|a, b| a.get("n").cmp(&b.get("n")));

    assert_eq!(dom.text_content(view.el()), "123");
    // Identity is preserved: the same elements moved, nothing was rebuilt.
    assert_eq!((el_of(&one), el_of(&two), el_of(&three)), before);
    assert_eq!(
        dom.child_nodes(view.el()),
        [before.0, before.1, before.2]
    );
}

#[test]
fn test_mutations_before_first_render_are_deferred() {
    let (dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());

    let view = span_children(&dyn_dom, &renderer, &store, "foo").build();
    store.add(foo_record("bar"));
    store.add(foo_record("baz"));

    assert_eq!(view.container().len(), 0);
    assert!(dom.child_nodes(view.el()).is_empty());

    view.render().unwrap();
    assert_eq!(dom.text_content(view.el()), "barbaz");
}

#[test]
fn test_missing_child_view_is_a_configuration_error() {
    let (_dom, dyn_dom, _renderer) = setup();
    let store = Rc::new(RecordStore::new());
    let record = foo_record("bar");
    store.add(record.clone());
    let records: Rc<dyn RecordSet> = store.clone();

    let view = CollectionViewBuilder::new(dyn_dom, records).build();

    assert_eq!(
        view.render(),
        Err(ViewError::MissingChildView(record.id()))
    );
}

#[test]
fn test_duplicate_identifier_is_rejected() {
    let (_dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    let record = foo_record("bar");
    store.add(record.clone());

    let view = span_children(&dyn_dom, &renderer, &store, "foo").build();
    view.render().unwrap();

    assert_eq!(
        view.on_record_added(&record, 0),
        Err(ViewError::DuplicateChild(record.id()))
    );
}

#[test]
fn test_removed_child_keeps_no_bubbling_subscription() {
    let (_dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    let bar = foo_record("bar");
    store.add(bar.clone());

    let view = span_children(&dyn_dom, &renderer, &store, "foo").build();
    view.render().unwrap();
    let child = view.container().find_by_id(bar.id()).unwrap().view.clone();
    assert_eq!(child.events().handler_count(), 1);

    store.remove(bar.id());

    assert_eq!(child.events().handler_count(), 0);
}

#[test]
fn test_removing_unknown_record_is_a_no_op() {
    let (_dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    store.add(foo_record("bar"));

    let view = span_children(&dyn_dom, &renderer, &store, "foo").build();
    view.render().unwrap();

    let stranger = foo_record("unknown");
    assert_eq!(view.on_record_removed(&stranger), Ok(()));
    assert_eq!(view.container().len(), 1);
}

#[test]
fn test_custom_child_event_prefix() {
    let (_dom, dyn_dom, renderer) = setup();
    let store = Rc::new(RecordStore::new());
    store.add(foo_record("bar"));

    let view = span_children(&dyn_dom, &renderer, &store, "foo")
        .child_event_prefix("item:")
        .build();

    let log = event_log(&view);

    view.render().unwrap();

    assert!(log.borrow().iter().any(|name| name == "item:render"));
}

#[test]
fn test_nested_prefixes_name_each_level() {
    let (_dom, dyn_dom, renderer) = setup();
    let inner_store = Rc::new(RecordStore::new());
    inner_store.add(foo_record("bar"));
    let outer_store = Rc::new(RecordStore::new());
    outer_store.add(foo_record("baz"));

    let inner = span_children(&dyn_dom, &renderer, &inner_store, "foo")
        .child_event_prefix("inner:")
        .build();

    let inner_slot = Rc::new(RefCell::new(Some(inner as Rc<dyn ViewObject>)));
    let factory_slot = inner_slot.clone();
    let outer_records: Rc<dyn RecordSet> = outer_store;
    let outer = CollectionViewBuilder::new(dyn_dom, outer_records)
        .child_view(move |_record: &Rc<dyn Record>| {
            factory_slot
                .borrow_mut()
                .take()
                .ok_or(ViewError::NoElement)
        })
        .child_event_prefix("outer:")
        .build();

    let log = event_log(&outer);

    outer.render().unwrap();

    assert!(log.borrow().iter().any(|name| name == "outer:inner:render"));
    assert!(log.borrow().iter().any(|name| name == "outer:render"));
}

#[test]
fn test_heterogeneous_child_factory() {
    let (dom, dyn_dom, _renderer) = setup();
    let store = Rc::new(RecordStore::new());
    store.add(numbered("1"));
    store.add(numbered("2"));
    let records: Rc<dyn RecordSet> = store.clone();

    let factory_dom = dyn_dom.clone();
    let view = CollectionViewBuilder::new(dyn_dom, records)
        .child_view(move |record: &Rc<dyn Record>| {
            let tag = if record.get("n").as_deref() == Some("1") {
                "em"
            } else {
                "strong"
            };
            Ok(ViewBuilder::new(factory_dom.clone(), Renderer::new(Rc::new(TemplateRegistry::new())))
                .tag(tag)
                .template(Template::inline("{{n}}"))
                .record(record.clone())
                .build() as Rc<dyn ViewObject>)
        })
        .build();

    view.render().unwrap();

    assert_eq!(dom.inner_html(view.el()), "<em>1</em><strong>2</strong>");
}

#[test]
fn test_failed_subscription_mutation_is_latched() {
    let (dom, dyn_dom, _renderer) = setup();
    let store = Rc::new(RecordStore::new());
    let records: Rc<dyn RecordSet> = store.clone();

    // No child factory: an empty render succeeds, but the first added
    // record has nothing to build a child from.
    let view = CollectionViewBuilder::new(dyn_dom, records).build();
    view.render().unwrap();
    assert_eq!(view.take_last_error(), None);

    let record = foo_record("bar");
    store.add(record.clone());

    assert_eq!(
        view.take_last_error(),
        Some(ViewError::MissingChildView(record.id()))
    );
    assert_eq!(view.take_last_error(), None);
    assert_eq!(dom.inner_html(view.el()), "");
}
