// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `understory_routed_event` crate.

use std::sync::Arc;

use parking_lot::Mutex;
use understory_property::ObjectId;
use understory_reflect::{TypeKey, Typed};
use understory_routed_event::{
    RoutedEvent, RoutedEventArgs, RoutedEventRegistry, RoutingStrategy,
};

struct Element;
impl Typed for Element {
    fn type_key() -> TypeKey {
        TypeKey::new::<Self>("Element")
    }
}

struct Control;
impl Typed for Control {
    fn type_key() -> TypeKey {
        TypeKey::new::<Self>("Control").with_base::<Element>()
    }
}

struct Button;
impl Typed for Button {
    fn type_key() -> TypeKey {
        TypeKey::new::<Self>("Button").with_base::<Control>()
    }
}

struct Slider;
impl Typed for Slider {
    fn type_key() -> TypeKey {
        TypeKey::new::<Self>("Slider").with_base::<Control>()
    }
}

type Log = Arc<Mutex<Vec<&'static str>>>;

fn record(
    registry: &mut RoutedEventRegistry,
    owner: TypeKey,
    event: RoutedEvent<u32>,
    log: &Log,
    label: &'static str,
    handled_events_too: bool,
) {
    let log = Arc::clone(log);
    registry
        .register_class_handler(
            owner,
            event,
            move |_, _: &mut RoutedEventArgs<u32>| log.lock().push(label),
            handled_events_too,
        )
        .unwrap();
}

fn click(registry: &mut RoutedEventRegistry) -> RoutedEvent<u32> {
    registry
        .register(Control::type_key(), "Click", RoutingStrategy::Bubble)
        .unwrap()
}

#[test]
fn derived_handlers_run_first() {
    let mut registry = RoutedEventRegistry::new();
    let click = click(&mut registry);
    let log = Log::default();
    record(&mut registry, Element::type_key(), click, &log, "element", false);
    record(&mut registry, Control::type_key(), click, &log, "control-1", false);
    record(&mut registry, Button::type_key(), click, &log, "button", false);
    record(&mut registry, Control::type_key(), click, &log, "control-2", false);
    record(&mut registry, Slider::type_key(), click, &log, "slider", false);

    let sender = ObjectId::next();
    let mut args = RoutedEventArgs::new(click, sender, 1);
    let ran = registry.invoke_class_handlers(click, Button::type_key(), sender, &mut args);
    assert_eq!(ran, 4, "the slider handler does not apply to buttons");
    assert_eq!(
        *log.lock(),
        ["button", "control-1", "control-2", "element"]
    );

    let handlers = registry.class_handlers(click.id(), Button::type_key());
    let distances: Vec<_> = handlers.iter().map(|h| h.distance()).collect();
    assert_eq!(distances, [0, 1, 1, 2]);
    assert_eq!(handlers[0].declaring_type(), Button::type_key());
}

#[test]
fn handled_events_skip_handlers_that_did_not_ask() {
    let mut registry = RoutedEventRegistry::new();
    let click = click(&mut registry);
    let log = Log::default();
    {
        let log = Arc::clone(&log);
        registry
            .register_class_handler(
                Button::type_key(),
                click,
                move |_, args: &mut RoutedEventArgs<u32>| {
                    log.lock().push("button");
                    *args.payload_mut() += 1;
                    args.set_handled(true);
                },
                false,
            )
            .unwrap();
    }
    record(&mut registry, Control::type_key(), click, &log, "control", false);
    record(&mut registry, Element::type_key(), click, &log, "element", true);

    let sender = ObjectId::next();
    let mut args = RoutedEventArgs::new(click, sender, 10);
    let ran = registry.invoke_class_handlers(click, Button::type_key(), sender, &mut args);
    assert_eq!(ran, 2);
    assert_eq!(*log.lock(), ["button", "element"]);
    assert!(args.is_handled());
    assert_eq!(*args.payload(), 11);
}

#[test]
fn handler_lists_are_rebuilt_after_registration() {
    let mut registry = RoutedEventRegistry::new();
    let click = click(&mut registry);
    let log = Log::default();
    record(&mut registry, Control::type_key(), click, &log, "control", false);
    assert_eq!(registry.class_handlers(click.id(), Button::type_key()).len(), 1);

    record(&mut registry, Button::type_key(), click, &log, "button", false);
    let handlers = registry.class_handlers(click.id(), Button::type_key());
    assert_eq!(handlers.len(), 2);
    assert_eq!(handlers[0].declaring_type(), Button::type_key());
    assert!(
        registry.class_handlers(click.id(), Element::type_key()).is_empty(),
        "base instances do not see derived handlers"
    );
}

#[test]
fn added_owners_expose_the_event() {
    struct Menu;
    impl Typed for Menu {
        fn type_key() -> TypeKey {
            TypeKey::new::<Self>("Menu")
        }
    }

    let mut registry = RoutedEventRegistry::new();
    let click = click(&mut registry);
    assert_eq!(registry.find_by_name("Click", Menu::type_key()), None);
    registry.add_owner(click, Menu::type_key()).unwrap();
    assert_eq!(registry.find_by_name("Click", Menu::type_key()), Some(click.id()));
    assert_eq!(registry.find::<u32>("Click", Menu::type_key()), Some(click));
    assert!(registry.add_owner(click, Menu::type_key()).is_err(), "names collide");

    let definition = registry.definition(click.id()).unwrap();
    assert_eq!(definition.additional_owners(), [Menu::type_key()]);
    assert_eq!(definition.routing(), RoutingStrategy::Bubble);
    assert_eq!(definition.styling_name(), "click");
}
