//! Cart items (borrow intents).

use serde::{Deserialize, Serialize};

/// One line of the cart. `book_id` is the uniqueness key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub book_id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub price: f64,

    #[serde(default = "default_quantity")]
    pub quantity: u32,

    #[serde(default)]
    pub cover_image: String,
}

fn default_quantity() -> u32 {
    1
}

/// Add `item` to `items`: an existing line for the same book gains the
/// quantity, otherwise the item is appended.
pub fn merge_item(items: &mut Vec<CartItem>, item: CartItem) {
    match items.iter_mut().find(|existing| existing.book_id == item.book_id) {
        Some(existing) => existing.quantity += item.quantity,
        None => items.push(item),
    }
}

/// Sum of price × quantity over the cart.
pub fn total_price(items: &[CartItem]) -> f64 {
    items
        .iter()
        .map(|item| item.price * f64::from(item.quantity))
        .sum()
}

/// Number of books in the cart (the header badge value).
pub fn total_quantity(items: &[CartItem]) -> u32 {
    items.iter().map(|item| item.quantity).sum()
}
