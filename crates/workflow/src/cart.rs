//! Cart operations.

use common::{Money, ProductId, UserId};
use serde::Serialize;
use store::{CartItem, CartLine, Store};

use crate::error::CartError;

/// A user's cart as shown to them: lines at current prices and their sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
    pub total: Money,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Adds to and reads users' carts.
///
/// Adding an item does not reserve stock; availability is only checked at
/// checkout.
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Appends `quantity` units of a product to a user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartItem, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        self.store
            .get_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;

        let item = CartItem::new(user_id, product_id, quantity);
        self.store.add_cart_item(&item).await?;
        tracing::debug!(item_id = %item.id, "cart item added");
        Ok(item)
    }

    /// Returns a user's cart; an unknown user has an empty one.
    #[tracing::instrument(skip(self))]
    pub async fn cart(&self, user_id: UserId) -> Result<Cart, CartError> {
        let lines = self.store.cart_lines(user_id).await?;
        let total = domain::total_price(&lines)?;
        Ok(Cart {
            user_id,
            lines,
            total,
        })
    }
}
