use super::*;

/// A bound handler whose target has been resolved against a root: `element`
/// is the root itself for [`Target::Root`] and the tagged child for
/// [`Target::ById`].
pub struct DelegatedHandler<C> {
    pub handler: BoundHandler<C>,
    pub element: Element,
}

impl<C> Clone for DelegatedHandler<C> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            element: self.element.clone(),
        }
    }
}

impl<C> fmt::Debug for DelegatedHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedHandler")
            .field("handler", &self.handler)
            .field("element", &self.element)
            .finish()
    }
}

/// Returns the handlers that apply to `event`, in input order.
///
/// Each handler is judged on its own:
/// - `Root` matches when the event originated at the root itself, or for any
///   origin unless `ignore_children` is set.
/// - `ById` matches when the event originated at the tagged element itself, or
///   inside it unless `ignore_children` is set.
/// - `Document` never matches here; document handlers are dispatched by a
///   separate, unfiltered listener.
pub fn match_handlers<'a, C>(
    event: &Event,
    handlers: &'a [DelegatedHandler<C>],
    root: &Element,
) -> Vec<&'a DelegatedHandler<C>> {
    let Some(origin) = event.target_node() else {
        return Vec::new();
    };
    let dom = root.document().dom();

    handlers
        .iter()
        .filter(|delegated| {
            let handler = &delegated.handler;
            match &handler.target {
                Target::Root => origin == root.node_id() || !handler.ignore_children,
                Target::ById(_) => {
                    let element = delegated.element.node_id();
                    origin == element
                        || (!handler.ignore_children && dom.is_descendant_of(origin, element))
                }
                Target::Document => false,
            }
        })
        .collect()
}
