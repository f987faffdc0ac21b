use super::{AddedWidget, WidgetId};
use crate::extensions::{exposes_widget, ExtensionRegistry};

/// Map a display order to the widgets it refers to.
///
/// An identifier resolves to the host widget added under it, or to the widget
/// of an installed extension with that name. Extension widgets whose
/// extension is gone, and identifiers that match nothing, are skipped with a
/// warning, never an error.
pub fn resolve_widgets(
    order: &[WidgetId],
    added: &[AddedWidget],
    registry: &dyn ExtensionRegistry,
) -> Vec<AddedWidget> {
    let installed = registry.installed_extensions();

    order
        .iter()
        .filter_map(|id| {
            if let Some(widget) = added
                .iter()
                .find(|widget| widget.is_android() && widget.id() == id)
            {
                return Some(widget.clone());
            }
            if exposes_widget(&installed, id.as_str()) {
                return Some(AddedWidget::Extension {
                    extension_name: id.clone(),
                });
            }
            tracing::warn!(id = %id, "skipping unresolved widget");
            None
        })
        .collect()
}
