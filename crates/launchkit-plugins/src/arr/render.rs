//! Result rows for library entries and lookup candidates.

use super::service::ArrService;
use crate::common::plugin_icon;
use launchkit_core::{DisplayItem, ItemAction, RemoteItem};
use serde_json::json;

fn base_item(service: ArrService, id: String, text: String) -> DisplayItem {
    let icon = plugin_icon(service.id());
    DisplayItem::new(id, text).with_icons(&[icon.as_str()])
}

pub fn info(service: ArrService, subtext: String) -> DisplayItem {
    base_item(service, service.id().to_string(), service.name().to_string()).with_subtext(subtext)
}

pub fn not_found(service: ArrService, query: &str) -> DisplayItem {
    base_item(
        service,
        service.id().to_string(),
        format!("{} not found", service.noun()),
    )
    .with_subtext(query)
}

/// An entry already in the library. Records without an id are skipped.
pub fn library_item(service: ArrService, base_url: &str, item: &RemoteItem) -> Option<DisplayItem> {
    let id = item.i64_field("id")?;
    let noun = service.noun();
    let web_url = service
        .web_path(item)
        .map(|path| format!("{}{}", base_url, path))
        .unwrap_or_else(|| base_url.to_string());

    Some(
        base_item(
            service,
            format!("{}-{}", service.id(), id),
            service.title(item),
        )
        .with_subtext(service.library_subtext(item))
        .with_actions([
            ItemAction::open_url("open", &format!("Open {} in {}", noun, service.name()), web_url),
            ItemAction::plugin("rescan", &format!("Rescan {}", noun), "rescan", json!({"id": id})),
            ItemAction::plugin("delete", &format!("Delete {}", noun), "delete", json!({"id": id})),
        ]),
    )
}

/// A lookup candidate that can be added to the library.
pub fn lookup_item(
    service: ArrService,
    base_url: &str,
    index: usize,
    record: &RemoteItem,
) -> DisplayItem {
    let title = service.title(record);
    let name = record.str_field(service.name_field()).unwrap_or_default();
    let value = record.clone().into_value();

    base_item(service, format!("{}-lookup-{}", service.id(), index), title)
        .with_subtext(service.lookup_subtext(record))
        .with_actions([
            ItemAction::plugin(
                "monitor",
                "Monitor",
                "add",
                json!({"record": value.clone(), "search": false}),
            ),
            ItemAction::plugin(
                "monitor-search",
                "Monitor + Search",
                "add",
                json!({"record": value, "search": true}),
            ),
            ItemAction::open_url(
                "view",
                &format!("View on {}", service.name()),
                format!("{}{}", base_url, service.search_path(name)),
            ),
        ])
        .with_actions(service.external_links(record))
}

/// Shown when a lookup returns nothing: hand the term to the web UI.
pub fn search_fallback(service: ArrService, base_url: &str, term: &str) -> DisplayItem {
    base_item(service, service.id().to_string(), format!("Search {}", term))
        .with_subtext(format!(
            "Search for {} on {}",
            service.noun().to_lowercase(),
            service.name()
        ))
        .with_action(ItemAction::open_url(
            "search",
            &format!("Search on {}", service.name()),
            format!("{}{}", base_url, service.search_path(term)),
        ))
}
