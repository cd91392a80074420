//! Declarative View Descriptions
//!
//! A [`View`] describes what should be on screen. The renderer turns it into
//! live nodes; components return views; dynamic child lists produce new views
//! every time their state changes.
//!
//! # Props
//!
//! An element's [`Props`] map names to [`Prop`]s. How a prop is applied
//! depends on its name and shape:
//!
//! | Prop | Applied as |
//! |---|---|
//! | `children` | child views, static or produced by a tracked closure |
//! | `text` | a text child |
//! | `style` | inline style properties, each of which may be bound |
//! | `key` | reconciliation key |
//! | `on<event>` + [`Prop::Handler`] | event listener |
//! | [`Prop::Bind`] | attribute kept in sync with the closure's result |
//! | [`Prop::Deferred`] | attribute set once the value settles |
//! | [`Prop::Static`] | attribute set once |
//!
//! Closures compare by identity, so two views are equal only if they share
//! their closures.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::dom::Event;
use crate::reactive::Deferred;

pub type BindFn = Rc<dyn Fn() -> Value>;
pub type Handler = Rc<dyn Fn(&Event)>;
pub type ChildrenFn = Rc<dyn Fn() -> ChildUpdate>;

/// Result of a dynamic child list run.
#[derive(Clone, PartialEq, Debug)]
pub enum ChildUpdate {
    /// Keep the current children untouched.
    Ignore,
    /// Patch the children to match these views.
    Replace(Vec<View>),
}

impl From<Vec<View>> for ChildUpdate {
    fn from(views: Vec<View>) -> Self {
        Self::Replace(views)
    }
}

#[derive(Clone)]
pub enum View {
    /// Renders nothing.
    Empty,
    Text(String),
    Element(Element),
    Fragment(Vec<View>),
    /// A child slot re-rendered whenever the state its closure read changes.
    Dynamic(ChildrenFn),
    /// A placeholder until the view settles.
    Deferred(Deferred<View>),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Element {
    pub tag: String,
    pub props: Props,
}

impl View {
    pub fn el(tag: impl Into<String>, props: Props) -> Self {
        Self::Element(Element {
            tag: tag.into(),
            props,
        })
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn fragment(children: Vec<View>) -> Self {
        Self::Fragment(children)
    }

    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn() -> ChildUpdate + 'static,
    {
        Self::Dynamic(Rc::new(f))
    }

    pub fn deferred(value: Deferred<View>) -> Self {
        Self::Deferred(value)
    }

    /// The element or component name, if this is an element view.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element(el) => Some(&el.tag),
            _ => None,
        }
    }
}

impl From<&str> for View {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for View {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => a == b,
            (Self::Fragment(a), Self::Fragment(b)) => a == b,
            (Self::Dynamic(a), Self::Dynamic(b)) => same_fn(a, b),
            (Self::Deferred(a), Self::Deferred(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Element(el) => el.fmt(f),
            Self::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
            Self::Deferred(d) => d.fmt(f),
        }
    }
}

/// Compare closures by the address of their shared allocation.
pub(crate) fn same_fn<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

#[derive(Clone)]
pub enum Prop {
    Static(Value),
    Bind(BindFn),
    Deferred(Deferred<Value>),
    Handler(Handler),
    Style(IndexMap<String, Prop>),
    Children(Children),
}

#[derive(Clone)]
pub enum Children {
    Static(Vec<View>),
    Dynamic(ChildrenFn),
}

impl PartialEq for Prop {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Static(a), Self::Static(b)) => a == b,
            (Self::Bind(a), Self::Bind(b)) => same_fn(a, b),
            (Self::Deferred(a), Self::Deferred(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => same_fn(a, b),
            (Self::Style(a), Self::Style(b)) => a == b,
            (Self::Children(a), Self::Children(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for Children {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Static(a), Self::Static(b)) => a == b,
            (Self::Dynamic(a), Self::Dynamic(b)) => same_fn(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Bind(_) => f.write_str("Bind(..)"),
            Self::Deferred(d) => d.fmt(f),
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Style(map) => f.debug_tuple("Style").field(map).finish(),
            Self::Children(Children::Static(views)) => f.debug_tuple("Children").field(views).finish(),
            Self::Children(Children::Dynamic(_)) => f.write_str("Children(..)"),
        }
    }
}

/// Ordered element properties with a builder interface.
///
/// ```rust
/// use serde_json::json;
/// use trellis_core::render::{Props, View};
///
/// let props = Props::new()
///     .attr("id", "save")
///     .style("color", "green")
///     .text("Save");
/// assert_eq!(props.static_value("id"), Some(&json!("save")));
/// let _button = View::el("button", props);
/// ```
#[derive(Clone, Default, PartialEq)]
pub struct Props {
    entries: IndexMap<String, Prop>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, prop: Prop) -> Self {
        self.insert(name, prop);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, prop: Prop) {
        self.entries.insert(name.into(), prop);
    }

    pub fn attr(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, Prop::Static(value.into()))
    }

    /// Attribute recomputed whenever the state `f` reads changes.
    pub fn bind<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.set(name, Prop::Bind(Rc::new(f)))
    }

    pub fn deferred(self, name: impl Into<String>, value: Deferred<Value>) -> Self {
        self.set(name, Prop::Deferred(value))
    }

    /// Listener for `event`, stored under `on<event>`.
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        self.set(format!("on{event}"), Prop::Handler(Rc::new(handler)))
    }

    /// Static inline style property.
    pub fn style(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.style_prop(property, Prop::Static(value.into()))
    }

    pub fn style_bind<F>(self, property: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.style_prop(property, Prop::Bind(Rc::new(f)))
    }

    fn style_prop(mut self, property: impl Into<String>, prop: Prop) -> Self {
        match self.entries.get_mut("style") {
            Some(Prop::Style(map)) => {
                map.insert(property.into(), prop);
            }
            _ => {
                let mut map = IndexMap::new();
                map.insert(property.into(), prop);
                self.entries.insert("style".to_string(), Prop::Style(map));
            }
        }
        self
    }

    pub fn text(self, content: impl Into<String>) -> Self {
        self.set("text", Prop::Static(Value::String(content.into())))
    }

    pub fn text_bind<F>(self, f: F) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        self.bind("text", f)
    }

    pub fn children(self, views: Vec<View>) -> Self {
        self.set("children", Prop::Children(Children::Static(views)))
    }

    /// Children recomputed whenever the state `f` reads changes.
    pub fn children_fn<F>(self, f: F) -> Self
    where
        F: Fn() -> ChildUpdate + 'static,
    {
        self.set("children", Prop::Children(Children::Dynamic(Rc::new(f))))
    }

    pub fn key(self, key: impl Into<String>) -> Self {
        self.set("key", Prop::Static(Value::String(key.into())))
    }

    pub fn get(&self, name: &str) -> Option<&Prop> {
        self.entries.get(name)
    }

    /// The value of a [`Prop::Static`] entry.
    pub fn static_value(&self, name: &str) -> Option<&Value> {
        match self.entries.get(name) {
            Some(Prop::Static(value)) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Prop)> {
        self.entries.iter().map(|(name, prop)| (name.as_str(), prop))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deferred entries that have not settled yet.
    pub fn pending(&self) -> Vec<(String, Deferred<Value>)> {
        self.entries
            .iter()
            .filter_map(|(name, prop)| match prop {
                Prop::Deferred(d) if d.is_pending() => Some((name.clone(), d.clone())),
                _ => None,
            })
            .collect()
    }

    /// Replace settled deferred entries with their values.
    ///
    /// Fails with the first rejection. Pending entries are left as they are.
    pub fn settled(&self) -> Result<Props, crate::error::Rejected> {
        let mut out = self.clone();
        for prop in out.entries.values_mut() {
            if let Prop::Deferred(d) = prop {
                if let Some(outcome) = d.peek() {
                    *prop = Prop::Static(outcome?);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn style_builder_merges_properties() {
        let props = Props::new().style("color", "red").style("width", "10px");
        match props.get("style") {
            Some(Prop::Style(map)) => assert_eq!(map.len(), 2),
            other => panic!("unexpected style prop: {other:?}"),
        }
    }

    #[test]
    fn views_compare_closures_by_identity() {
        let f: ChildrenFn = Rc::new(|| ChildUpdate::Ignore);
        assert_eq!(View::Dynamic(f.clone()), View::Dynamic(f));
        assert_ne!(View::dynamic(|| ChildUpdate::Ignore), View::dynamic(|| ChildUpdate::Ignore));
        assert_eq!(
            View::el("li", Props::new().key("a").text("A")),
            View::el("li", Props::new().key("a").text("A"))
        );
    }

    #[test]
    fn settled_substitutes_resolved_and_reports_rejection() {
        let props = Props::new()
            .deferred("title", Deferred::resolved(json!("Hi")))
            .attr("id", 1);
        let settled = props.settled().unwrap();
        assert_eq!(settled.static_value("title"), Some(&json!("Hi")));

        let broken = props.deferred("body", Deferred::rejected("404"));
        assert_eq!(broken.settled().unwrap_err().0, "404");
    }

    #[test]
    fn pending_lists_unsettled_entries_only() {
        let (waiting, _resolver) = Deferred::channel();
        let props = Props::new()
            .deferred("ready", Deferred::resolved(json!(1)))
            .deferred("later", waiting);
        let pending = props.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, "later");
    }
}
