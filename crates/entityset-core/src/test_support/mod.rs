use crate::traits::{EntityKey, EntityKind, Path};
use serde::{Deserialize, Serialize};

/// Entity path for the primary test entity.
pub const WIDGET_PATH: &str = "entityset_core::test_support::Widget";

/// Entity path for the secondary test entity.
pub const GADGET_PATH: &str = "entityset_core::test_support::Gadget";

///
/// Widget
///
/// Shared test-only entity keyed by `u64`.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Widget {
    pub id: u64,
    pub name: String,
    pub qty: u32,
}

impl Widget {
    #[must_use]
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            qty: 0,
        }
    }

    #[must_use]
    pub const fn with_qty(mut self, qty: u32) -> Self {
        self.qty = qty;
        self
    }
}

impl Path for Widget {
    const PATH: &'static str = WIDGET_PATH;
}

impl EntityKey for Widget {
    type Key = u64;
}

impl EntityKind for Widget {
    fn key(&self) -> Self::Key {
        self.id
    }
}

///
/// Gadget
///
/// Second entity type so sessions can be tested across stores.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Gadget {
    pub id: u64,
    pub label: String,
}

impl Gadget {
    #[must_use]
    pub fn new(id: u64, label: &str) -> Self {
        Self {
            id,
            label: label.to_string(),
        }
    }
}

impl Path for Gadget {
    const PATH: &'static str = GADGET_PATH;
}

impl EntityKey for Gadget {
    type Key = u64;
}

impl EntityKind for Gadget {
    fn key(&self) -> Self::Key {
        self.id
    }
}

/// Standard widget rows used by query tests.
#[must_use]
pub fn widgets() -> Vec<Widget> {
    vec![
        Widget::new(1, "bolt").with_qty(40),
        Widget::new(2, "nut").with_qty(15),
        Widget::new(3, "washer").with_qty(15),
        Widget::new(4, "gear").with_qty(2),
        Widget::new(5, "spring").with_qty(9),
    ]
}
