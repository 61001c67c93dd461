//! In-memory customer and order records for the personal shopper desk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub name: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

fn one() -> u32 {
    1
}

/// The order body, also kept in the `current_order` slot while an order is
/// being assembled.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderDetails {
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<String>,
}

impl OrderDetails {
    pub fn computed_total(&self) -> f64 {
        self.items
            .iter()
            .map(|i| i.price.unwrap_or(0.0) * f64::from(i.quantity))
            .sum()
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub details: OrderDetails,
    pub placed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ReturnRecord {
    pub order_id: i64,
    pub item_name: String,
    pub reason: String,
}

#[derive(Default)]
struct Tables {
    customers: Vec<Customer>,
    orders: Vec<Order>,
    returns: Vec<ReturnRecord>,
}

#[derive(Default)]
pub struct CustomerStore {
    tables: Mutex<Tables>,
}

impl CustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a customer by exact name, creating one if absent.
    pub async fn get_or_create_customer(&self, first_name: &str, last_name: &str) -> i64 {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .customers
            .iter()
            .find(|c| c.first_name == first_name && c.last_name == last_name)
        {
            info!(id = existing.id, "existing customer found");
            return existing.id;
        }
        let id = tables.customers.len() as i64 + 1;
        tables.customers.push(Customer {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            created_at: Utc::now(),
        });
        info!(id, "customer created");
        id
    }

    pub async fn find_customer(&self, first_name: &str, last_name: &str) -> Option<Customer> {
        self.tables
            .lock()
            .await
            .customers
            .iter()
            .find(|c| c.first_name == first_name && c.last_name == last_name)
            .cloned()
    }

    pub async fn add_order(&self, customer_id: i64, details: OrderDetails) -> i64 {
        let mut tables = self.tables.lock().await;
        let id = tables.orders.len() as i64 + 1;
        tables.orders.push(Order {
            id,
            customer_id,
            details,
            placed_at: Utc::now(),
        });
        info!(customer_id, order_id = id, "order added");
        id
    }

    /// Newest first.
    pub async fn customer_orders(&self, customer_id: i64) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .tables
            .lock()
            .await
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at).then(b.id.cmp(&a.id)));
        orders
    }

    /// Order history rendered for the reasoning call.
    pub async fn order_history(&self, first_name: &str, last_name: &str) -> String {
        let Some(customer) = self.find_customer(first_name, last_name).await else {
            return "No order history was found for this customer.".to_string();
        };
        let orders = self.customer_orders(customer.id).await;
        if orders.is_empty() {
            return format!("{} {} has no orders yet.", first_name, last_name);
        }

        let mut history = format!("Order history for {} {}:\n\n", first_name, last_name);
        for order in orders {
            history.push_str(&format!(
                "Order #{} ({}):\n",
                order.id,
                order.placed_at.format("%Y-%m-%d %H:%M")
            ));
            if order.details.items.is_empty() {
                history.push_str(&format!(
                    "- {}\n",
                    serde_json::to_string(&order.details).unwrap_or_default()
                ));
            }
            for item in &order.details.items {
                history.push_str(&format!("- {}x {}", item.quantity, item.name));
                if let Some(price) = item.price {
                    history.push_str(&format!(" ({})", format_yen(price)));
                }
                history.push('\n');
            }
            history.push('\n');
        }
        history
    }

    /// The order, if it belongs to the customer.
    pub async fn order_for(&self, customer_id: i64, order_id: i64) -> Option<Order> {
        self.tables
            .lock()
            .await
            .orders
            .iter()
            .find(|o| o.id == order_id && o.customer_id == customer_id)
            .cloned()
    }

    pub async fn record_return(&self, order_id: i64, item_name: &str, reason: &str) {
        self.tables.lock().await.returns.push(ReturnRecord {
            order_id,
            item_name: item_name.to_string(),
            reason: reason.to_string(),
        });
        info!(order_id, item = item_name, "return recorded");
    }

    pub async fn returns(&self) -> Vec<ReturnRecord> {
        self.tables.lock().await.returns.clone()
    }

    pub async fn clear(&self) {
        *self.tables.lock().await = Tables::default();
    }

    /// Reset the store to two known customers, with three past orders for
    /// Taro Yamada. Returns the order ids.
    pub async fn seed_test_orders(&self) -> [i64; 3] {
        self.clear().await;
        self.get_or_create_customer("Hanako", "Suzuki").await;
        let taro = self.get_or_create_customer("Taro", "Yamada").await;

        let address = Some("1-1-1 Shibuya, Shibuya-ku, Tokyo".to_string());
        let item = |name: &str, quantity: u32, price: f64| OrderItem {
            name: name.to_string(),
            quantity,
            price: Some(price),
        };

        let electronics = OrderDetails {
            items: vec![
                item("Smartphone XS Pro", 1, 99999.0),
                item("Wireless earbuds", 1, 14999.0),
                item("Smartphone case (black)", 1, 2999.0),
            ],
            total: Some(117997.0),
            payment_method: Some("Credit card".into()),
            shipping_address: address.clone(),
        };
        let clothing = OrderDetails {
            items: vec![
                item("Men's casual shirt (blue)", 2, 3999.0),
                item("Jeans (dark wash)", 1, 5999.0),
                item("Leather belt", 1, 3499.0),
            ],
            total: Some(17496.0),
            payment_method: Some("PayPay".into()),
            shipping_address: address.clone(),
        };
        let household = OrderDetails {
            items: vec![
                item("Coffee maker", 1, 8999.0),
                item("Towel set", 1, 4999.0),
                item("Cushion", 2, 2499.0),
            ],
            total: Some(18996.0),
            payment_method: Some("Credit card".into()),
            shipping_address: address,
        };

        let ids = [
            self.add_order(taro, electronics).await,
            self.add_order(taro, clothing).await,
            self.add_order(taro, household).await,
        ];
        info!(?ids, "test orders seeded");
        ids
    }
}

/// Whole yen amounts print without decimals.
pub fn format_yen(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("¥{}", amount as i64)
    } else {
        format!("¥{:.2}", amount)
    }
}
