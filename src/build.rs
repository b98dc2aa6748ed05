//! Materializes the item list into the document.
//!
//! Produces the container/item/button/dropdown structure, relocates
//! externally-owned content nodes (recording where they came from), and
//! applies state changes to the rendered tree as the machine reports them.

use crate::config::{Config, IconStyle, Mode};
use crate::dom::{self, Document, NodeId};
use crate::item::{Item, ItemContent};
use crate::state::StateChange;
use lazy_static::lazy_static;
use std::collections::HashMap;

const CONTAINER_CLASS: &str = "accordion-items-container";
const ITEM_CLASS: &str = "accordion-item";
const TITLE_TAG: &str = "h4";
const TITLE_WRAPPER_CLASS: &str = "accordion-item__title-wrapper";
const TITLE_BUTTON_CLASS: &str = "accordion-item__click-target";
const TITLE_TEXT_CLASS: &str = "accordion-item__title";
const SUBTEXT_CLASS: &str = "accordion-item__subtext";
const ICON_CONTAINER_CLASS: &str = "accordion-icon-container";
const DROPDOWN_CLASS: &str = "accordion-item__dropdown";
const DESCRIPTION_CLASS: &str = "accordion-item__description";
const DIVIDER_CLASS: &str = "accordion-divider";
const DIVIDER_TOP_CLASS: &str = "accordion-divider--top";

lazy_static! {
    static ref ICONS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert(
            "plus",
            "<div class=\"plus\"><div class=\"plus__horizontal-line\"></div><div class=\"plus__vertical-line\"></div></div>",
        );
        m.insert(
            "arrow",
            "<div class=\"arrow-container\"><div class=\"arrow\"></div></div>",
        );
        m
    };
}

/// A content node moved into the accordion, with its previous home so
/// teardown can hand it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocatedNode {
    pub node: NodeId,
    pub original_parent: Option<NodeId>,
}

/// Built elements for one item.
#[derive(Debug, Clone)]
pub struct ItemBinding {
    pub id: String,
    pub element: NodeId,
    pub button: NodeId,
    pub dropdown: NodeId,
    pub description: NodeId,
}

/// The materialized accordion tree.
#[derive(Debug, Clone)]
pub struct BuiltAccordion {
    pub container: NodeId,
    pub bindings: Vec<ItemBinding>,
    pub relocated: Vec<RelocatedNode>,
}

impl BuiltAccordion {
    pub fn binding(&self, id: &str) -> Option<&ItemBinding> {
        self.bindings.iter().find(|b| b.id == id)
    }
}

/// Build the accordion structure under `el`, replacing its children.
/// Items named in `initially_open` start expanded with the dropdown already
/// unconstrained; everything else starts collapsed at zero height.
pub fn build(
    doc: &mut Document,
    el: NodeId,
    items: &[Item],
    config: &Config,
    initially_open: &[String],
) -> BuiltAccordion {
    doc.clear_children(el);

    let container = doc.create_element("ul");
    doc.add_class(container, CONTAINER_CLASS);
    doc.set_attr(
        container,
        "data-should-allow-multiple-open-items",
        bool_attr(config.mode == Mode::Multiple),
    );
    doc.set_attr(
        container,
        "data-is-dividers-enabled",
        bool_attr(config.dividers.enabled),
    );
    doc.set_attr(
        container,
        "data-is-first-divider-visible",
        bool_attr(config.dividers.show_first),
    );
    doc.set_attr(
        container,
        "data-is-last-divider-visible",
        bool_attr(config.dividers.show_last),
    );
    doc.set_attr(
        container,
        "data-accordion-title-alignment",
        config.title_alignment.as_str(),
    );
    doc.set_attr(
        container,
        "data-accordion-icon-placement",
        config.icon_placement.as_str(),
    );
    doc.append_child(el, container);

    if let IconStyle::Custom(token) = &config.icon_style {
        doc.set_attr(el, "data-custom-icon", token);
    }

    let mut bindings = Vec::new();
    let mut relocated = Vec::new();
    let last = items.len().saturating_sub(1);

    for (index, item) in items.iter().enumerate() {
        let element = doc.create_element("li");
        doc.add_class(element, ITEM_CLASS);
        doc.set_attr(element, "data-accordion-id", &item.id);

        if config.dividers.enabled && index == 0 && config.dividers.show_first {
            let divider = doc.create_element("div");
            doc.add_class(divider, DIVIDER_CLASS);
            doc.add_class(divider, DIVIDER_TOP_CLASS);
            doc.set_attr(divider, "aria-hidden", "true");
            doc.append_child(element, divider);
        }

        let wrapper = doc.create_element(TITLE_TAG);
        doc.add_class(wrapper, TITLE_WRAPPER_CLASS);
        doc.set_attr(wrapper, "role", "heading");
        doc.set_attr(wrapper, "aria-level", "3");

        let button = doc.create_element("button");
        doc.add_class(button, TITLE_BUTTON_CLASS);
        doc.set_attr(button, "id", &format!("button-{}", item.id));
        doc.set_attr(button, "aria-controls", &format!("dropdown-{}", item.id));

        let max_width = doc.create_element("span");
        doc.add_class(max_width, "max-width-span");

        let title_text = doc.create_element("span");
        doc.add_class(title_text, TITLE_TEXT_CLASS);
        doc.set_text(title_text, &item.title);
        doc.append_child(max_width, title_text);

        if let Some(subtitle) = &item.subtitle {
            let subtext = doc.create_element("span");
            doc.add_class(subtext, SUBTEXT_CLASS);
            doc.set_text(subtext, subtitle);
            doc.append_child(title_text, subtext);
        }

        let icon = doc.create_element("div");
        doc.add_class(icon, ICON_CONTAINER_CLASS);
        doc.set_attr(icon, "aria-hidden", "true");
        if let Some(markup) = ICONS.get(config.icon_style.token()) {
            dom::set_inner_html(doc, icon, markup);
        }
        doc.append_child(max_width, icon);

        doc.append_child(button, max_width);
        doc.append_child(wrapper, button);
        doc.append_child(element, wrapper);

        let dropdown = doc.create_element("div");
        doc.add_class(dropdown, DROPDOWN_CLASS);
        doc.set_attr(dropdown, "id", &format!("dropdown-{}", item.id));
        doc.set_attr(dropdown, "role", "region");
        doc.set_attr(dropdown, "aria-labelledby", &format!("button-{}", item.id));

        let description = doc.create_element("div");
        doc.add_class(description, DESCRIPTION_CLASS);
        match &item.content {
            ItemContent::Nodes(nodes) => {
                for node in nodes {
                    relocated.push(RelocatedNode {
                        node: *node,
                        original_parent: doc.parent(*node),
                    });
                    doc.append_child(description, *node);
                }
            }
            ItemContent::Fragment(html) => {
                if !html.is_empty() {
                    dom::set_inner_html(doc, description, html);
                }
            }
        }
        doc.append_child(dropdown, description);
        doc.append_child(element, dropdown);

        if config.dividers.enabled && (index < last || config.dividers.show_last) {
            let divider = doc.create_element("div");
            doc.add_class(divider, DIVIDER_CLASS);
            doc.set_attr(divider, "aria-hidden", "true");
            doc.append_child(element, divider);
        }

        if initially_open.contains(&item.id) {
            doc.set_attr(button, "aria-expanded", "true");
            doc.set_attr(element, "data-is-open", "true");
            doc.set_attr(dropdown, "style", "display: block; max-height: none;");
        } else {
            doc.set_attr(button, "aria-expanded", "false");
            doc.set_attr(element, "data-is-open", "false");
            doc.set_attr(dropdown, "style", "max-height: 0px;");
        }

        doc.append_child(container, element);
        bindings.push(ItemBinding {
            id: item.id.clone(),
            element,
            button,
            dropdown,
            description,
        });
    }

    BuiltAccordion {
        container,
        bindings,
        relocated,
    }
}

/// Apply one state-machine notification to the built tree.
///
/// Opening shows the dropdown constrained while the transition runs, then
/// lifts the constraint on settle so later content reflows are not clipped;
/// closing constrains back down to zero.
pub fn apply_change(doc: &mut Document, built: &BuiltAccordion, change: &StateChange) {
    let Some(binding) = built.binding(change.id()) else {
        return;
    };
    match change {
        StateChange::OpenStarted { .. } => {
            doc.set_attr(binding.element, "data-is-open", "true");
            doc.set_attr(binding.element, "data-animating", "true");
            doc.set_attr(binding.button, "aria-expanded", "true");
            doc.set_attr(binding.dropdown, "style", "display: block;");
        }
        StateChange::OpenSettled { .. } => {
            doc.remove_attr(binding.element, "data-animating");
            doc.set_attr(binding.dropdown, "style", "display: block; max-height: none;");
        }
        StateChange::CloseStarted { .. } => {
            doc.set_attr(binding.element, "data-is-open", "false");
            doc.set_attr(binding.element, "data-animating", "true");
            doc.set_attr(binding.button, "aria-expanded", "false");
        }
        StateChange::CloseSettled { .. } => {
            doc.remove_attr(binding.element, "data-animating");
            doc.set_attr(binding.dropdown, "style", "max-height: 0px;");
        }
    }
}

fn bool_attr(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Dividers, IconPlacement, InitialOpen, ItemLimit, TitleAlignment};

    fn fragment_items(titles: &[&str]) -> Vec<Item> {
        titles
            .iter()
            .enumerate()
            .map(|(order, title)| Item {
                id: title.to_lowercase(),
                title: title.to_string(),
                subtitle: None,
                content: ItemContent::Fragment(format!("<p>{}</p>", title)),
                order,
            })
            .collect()
    }

    fn setup() -> (Document, NodeId) {
        let mut doc = Document::new("body");
        let el = doc.create_element("div");
        doc.append_child(doc.root(), el);
        (doc, el)
    }

    #[test]
    fn test_structure_and_aria_wiring() {
        let (mut doc, el) = setup();
        let items = fragment_items(&["Intro"]);
        let built = build(&mut doc, el, &items, &Config::default(), &[]);

        let binding = built.binding("intro").unwrap();
        assert_eq!(doc.attr(binding.element, "data-accordion-id"), Some("intro"));
        assert_eq!(doc.attr(binding.button, "id"), Some("button-intro"));
        assert_eq!(doc.attr(binding.button, "aria-controls"), Some("dropdown-intro"));
        assert_eq!(doc.attr(binding.dropdown, "id"), Some("dropdown-intro"));
        assert_eq!(doc.attr(binding.dropdown, "aria-labelledby"), Some("button-intro"));
        assert_eq!(doc.attr(binding.button, "aria-expanded"), Some("false"));
    }

    #[test]
    fn test_initially_open_item_is_unconstrained() {
        let (mut doc, el) = setup();
        let items = fragment_items(&["Intro", "Extras"]);
        let built = build(
            &mut doc,
            el,
            &items,
            &Config::default(),
            &["intro".to_string()],
        );

        let open = built.binding("intro").unwrap();
        assert_eq!(doc.attr(open.button, "aria-expanded"), Some("true"));
        assert_eq!(
            doc.attr(open.dropdown, "style"),
            Some("display: block; max-height: none;")
        );
        let closed = built.binding("extras").unwrap();
        assert_eq!(doc.attr(closed.dropdown, "style"), Some("max-height: 0px;"));
    }

    #[test]
    fn test_relocation_records_original_parent() {
        let (mut doc, el) = setup();
        let aside = doc.create_element("aside");
        doc.append_child(doc.root(), aside);
        let owned = doc.create_element("p");
        doc.set_text(owned, "moved");
        doc.append_child(aside, owned);

        let items = vec![Item {
            id: "details".to_string(),
            title: "Details".to_string(),
            subtitle: None,
            content: ItemContent::Nodes(vec![owned]),
            order: 0,
        }];
        let built = build(&mut doc, el, &items, &Config::default(), &[]);

        // Ownership transferred: the previous parent no longer holds it.
        assert!(!doc.children(aside).contains(&owned));
        assert_eq!(
            built.relocated,
            vec![RelocatedNode {
                node: owned,
                original_parent: Some(aside),
            }]
        );
        let binding = built.binding("details").unwrap();
        assert!(doc.children(binding.description).contains(&owned));
    }

    #[test]
    fn test_divider_visibility() {
        let (mut doc, el) = setup();
        let items = fragment_items(&["A", "B", "C"]);
        let config = Config {
            dividers: Dividers {
                enabled: true,
                show_first: false,
                show_last: false,
            },
            ..Config::default()
        };
        let built = build(&mut doc, el, &items, &config, &[]);

        let count = |binding: &ItemBinding| {
            doc.children(binding.element)
                .iter()
                .filter(|n| doc.has_class(**n, DIVIDER_CLASS))
                .count()
        };
        // No top divider on the first item, no bottom divider on the last,
        // interior items keep their bottom divider.
        assert_eq!(count(built.binding("a").unwrap()), 1);
        assert_eq!(count(built.binding("b").unwrap()), 1);
        assert_eq!(count(built.binding("c").unwrap()), 0);
    }

    #[test]
    fn test_custom_icon_token_is_exposed_on_the_root() {
        let (mut doc, el) = setup();
        let items = fragment_items(&["A"]);
        let config = Config {
            mode: Mode::Single,
            initial_open: InitialOpen::None,
            limit: ItemLimit::Unlimited,
            icon_style: IconStyle::Custom("chevron".to_string()),
            icon_placement: IconPlacement::Right,
            dividers: Dividers {
                enabled: true,
                show_first: true,
                show_last: true,
            },
            url_sync: false,
            title_alignment: TitleAlignment::Left,
        };
        build(&mut doc, el, &items, &config, &[]);
        assert_eq!(doc.attr(el, "data-custom-icon"), Some("chevron"));
    }

    #[test]
    fn test_apply_change_walks_the_animation_contract() {
        let (mut doc, el) = setup();
        let items = fragment_items(&["A"]);
        let built = build(&mut doc, el, &items, &Config::default(), &[]);
        let binding = built.binding("a").unwrap().clone();

        apply_change(
            &mut doc,
            &built,
            &StateChange::OpenStarted {
                id: "a".to_string(),
            },
        );
        assert_eq!(doc.attr(binding.element, "data-animating"), Some("true"));
        assert_eq!(doc.attr(binding.element, "data-is-open"), Some("true"));

        apply_change(
            &mut doc,
            &built,
            &StateChange::OpenSettled {
                id: "a".to_string(),
            },
        );
        assert_eq!(doc.attr(binding.element, "data-animating"), None);
        assert_eq!(
            doc.attr(binding.dropdown, "style"),
            Some("display: block; max-height: none;")
        );
    }
}
