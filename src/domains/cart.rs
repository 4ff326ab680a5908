//! Shopping cart: products added by id, quantities adjusted in place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::reducer::{ReducerRegistry, Slice};
use crate::store::{Action, ReducerError, StoreError};

pub const ADD_ITEM: &str = "ADD_ITEM";
pub const REMOVE_ITEM: &str = "REMOVE_ITEM";
pub const UPDATE_QUANTITY: &str = "UPDATE_QUANTITY";
pub const CLEAR_CART: &str = "CLEAR_CART";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u32,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: u32,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CartTotals {
    /// Sum of quantities. Wider than a single quantity so it cannot overflow.
    pub items: u64,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
struct ItemRef {
    id: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct QuantityChange {
    id: u32,
    quantity: i64,
}

type CartReducer = fn(&Arc<CartState>, &Action) -> Result<Arc<CartState>, ReducerError>;

fn reducers() -> [(&'static str, CartReducer); 4] {
    [
        (ADD_ITEM, add_item),
        (REMOVE_ITEM, remove_item),
        (UPDATE_QUANTITY, update_quantity),
        (CLEAR_CART, clear_cart),
    ]
}

/// Registry for a Store whose whole state is the cart.
pub fn registry() -> Result<ReducerRegistry<CartState>, StoreError> {
    let mut registry = ReducerRegistry::new();
    for (kind, reducer) in reducers() {
        registry.register(kind, reducer)?;
    }
    Ok(registry)
}

/// The cart as a slice of a larger state.
pub fn slice<S>(
    get: fn(&S) -> &Arc<CartState>,
    set: fn(&mut S, Arc<CartState>),
) -> Result<Slice<S, CartState>, StoreError> {
    reducers()
        .into_iter()
        .try_fold(Slice::new("cart", get, set), |slice, (kind, reducer)| slice.on(kind, reducer))
}

fn add_item(state: &Arc<CartState>, action: &Action) -> Result<Arc<CartState>, ReducerError> {
    let product: Product = action.payload_as()?;
    let mut items = state.items.clone();
    match items.iter_mut().find(|item| item.id == product.id) {
        Some(existing) => {
            existing.quantity = existing.quantity.checked_add(1).ok_or_else(|| {
                ReducerError::rejected(
                    ADD_ITEM,
                    format!("quantity of item {} is already at its maximum", product.id),
                )
            })?;
        }
        None => items.push(CartItem {
            id: product.id,
            name: product.name,
            price: product.price,
            quantity: 1,
        }),
    }
    Ok(Arc::new(CartState { items }))
}

fn remove_item(state: &Arc<CartState>, action: &Action) -> Result<Arc<CartState>, ReducerError> {
    let target: ItemRef = action.payload_as()?;
    if !state.items.iter().any(|item| item.id == target.id) {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(CartState {
        items: state
            .items
            .iter()
            .filter(|item| item.id != target.id)
            .cloned()
            .collect(),
    }))
}

/// A quantity of zero or less removes the item.
fn update_quantity(state: &Arc<CartState>, action: &Action) -> Result<Arc<CartState>, ReducerError> {
    let change: QuantityChange = action.payload_as()?;
    let Some(current) = state.items.iter().find(|item| item.id == change.id) else {
        return Ok(Arc::clone(state));
    };
    if change.quantity <= 0 {
        return remove_item(state, action);
    }
    let quantity = u32::try_from(change.quantity)
        .map_err(|_| ReducerError::rejected(UPDATE_QUANTITY, format!("quantity {} too large", change.quantity)))?;
    if current.quantity == quantity {
        return Ok(Arc::clone(state));
    }
    let items = state
        .items
        .iter()
        .map(|item| {
            if item.id == change.id {
                CartItem {
                    quantity,
                    ..item.clone()
                }
            } else {
                item.clone()
            }
        })
        .collect();
    Ok(Arc::new(CartState { items }))
}

fn clear_cart(state: &Arc<CartState>, _action: &Action) -> Result<Arc<CartState>, ReducerError> {
    if state.items.is_empty() {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(CartState::default()))
}

/// Item count and total price.
pub fn totals(state: &CartState) -> CartTotals {
    state.items.iter().fold(CartTotals::default(), |acc, item| CartTotals {
        items: acc.items + u64::from(item.quantity),
        price: acc.price + item.price * f64::from(item.quantity),
    })
}

/// Action builders.
pub mod actions {
    use super::*;

    pub fn add_item(product: &Product) -> Result<Action, StoreError> {
        Action::from_payload(ADD_ITEM, product)
    }

    pub fn remove_item(id: u32) -> Action {
        Action::with_payload(REMOVE_ITEM, serde_json::json!({ "id": id }))
    }

    pub fn update_quantity(id: u32, quantity: i64) -> Result<Action, StoreError> {
        Action::from_payload(UPDATE_QUANTITY, &QuantityChange { id, quantity })
    }

    pub fn clear() -> Action {
        Action::new(CLEAR_CART)
    }
}
