//! Personal shopper tools
//!
//! Identity lives in the `first_name`, `last_name` and `customer_id` slots;
//! the order being assembled lives in `current_order`. Tools that need a
//! customer tell the agent to identify one first instead of failing.

use super::store::{format_yen, CustomerStore, OrderDetails, OrderItem};
use agentdesk_tools::{Tool, ToolContext, ToolResult};
use serde_json::{json, Value};
use std::sync::Arc;

pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const CUSTOMER_ID: &str = "customer_id";
pub const CURRENT_ORDER: &str = "current_order";

const IDENTIFY_FIRST: &str = "Please identify the customer first using the identify_customer tool.";

struct Identity {
    first_name: String,
    last_name: String,
    customer_id: Option<i64>,
}

fn identity(ctx: &ToolContext<'_>) -> Option<Identity> {
    Some(Identity {
        first_name: ctx.slot_str(FIRST_NAME)?.to_string(),
        last_name: ctx.slot_str(LAST_NAME)?.to_string(),
        customer_id: ctx.slot(CUSTOMER_ID).and_then(|v| v.as_i64()),
    })
}

fn current_order(ctx: &ToolContext<'_>) -> Option<OrderDetails> {
    ctx.slot(CURRENT_ORDER)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn store_order(ctx: &mut ToolContext<'_>, order: &OrderDetails) {
    ctx.set_slot(CURRENT_ORDER, serde_json::to_value(order).unwrap_or(Value::Null));
}

pub struct IdentifyCustomer {
    store: Arc<CustomerStore>,
}

impl IdentifyCustomer {
    pub fn new(store: Arc<CustomerStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for IdentifyCustomer {
    fn name(&self) -> &str {
        "identify_customer"
    }

    fn description(&self) -> &str {
        "Identify the customer by first and last name."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "first_name": { "type": "string", "description": "Customer's first name" },
                "last_name": { "type": "string", "description": "Customer's last name" }
            },
            "required": ["first_name", "last_name"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let first = args["first_name"].as_str().unwrap_or_default().trim();
        let last = args["last_name"].as_str().unwrap_or_default().trim();
        if first.is_empty() || last.is_empty() {
            return ToolResult::error("first_name and last_name must not be empty");
        }
        let id = self.store.get_or_create_customer(first, last).await;
        ctx.set_slot(FIRST_NAME, first);
        ctx.set_slot(LAST_NAME, last);
        ctx.set_slot(CUSTOMER_ID, id);
        ToolResult::text(format!("Thank you, {}. I've found your account.", first))
    }
}

pub struct StartOrder;

#[async_trait::async_trait]
impl Tool for StartOrder {
    fn name(&self) -> &str {
        "start_order"
    }

    fn description(&self) -> &str {
        "Start a new, empty order for the identified customer."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        if identity(ctx).is_none() {
            return ToolResult::text(IDENTIFY_FIRST);
        }
        store_order(ctx, &OrderDetails::default());
        ToolResult::text("Started a new order. What would you like?")
    }
}

pub struct AddItemToOrder;

#[async_trait::async_trait]
impl Tool for AddItemToOrder {
    fn name(&self) -> &str {
        "add_item_to_order"
    }

    fn description(&self) -> &str {
        "Add a product to the current order."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "item_name": { "type": "string", "description": "Product name" },
                "quantity": { "type": "integer", "description": "Number of units" },
                "price": { "type": "number", "description": "Unit price" }
            },
            "required": ["item_name", "quantity", "price"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        if identity(ctx).is_none() {
            return ToolResult::text(IDENTIFY_FIRST);
        }
        let name = args["item_name"].as_str().unwrap_or_default().trim().to_string();
        let Some(quantity) = args["quantity"].as_u64().filter(|q| *q > 0) else {
            return ToolResult::error("quantity must be a positive integer");
        };
        let Some(price) = args["price"].as_f64().filter(|p| p.is_finite() && *p >= 0.0) else {
            return ToolResult::error("price must be a non-negative number");
        };
        if name.is_empty() {
            return ToolResult::error("item_name must not be empty");
        }

        let mut order = current_order(ctx).unwrap_or_default();
        order.items.push(OrderItem {
            name: name.clone(),
            quantity: quantity.min(u64::from(u32::MAX)) as u32,
            price: Some(price),
        });
        store_order(ctx, &order);
        ToolResult::text(format!("Added {} x {} to the order.", quantity, name))
    }
}

pub struct CompleteOrder {
    store: Arc<CustomerStore>,
}

impl CompleteOrder {
    pub fn new(store: Arc<CustomerStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for CompleteOrder {
    fn name(&self) -> &str {
        "complete_order"
    }

    fn description(&self) -> &str {
        "Complete the current order and save it."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let Some(who) = identity(ctx) else {
            return ToolResult::text(IDENTIFY_FIRST);
        };
        let Some(mut order) = current_order(ctx).filter(|o| !o.items.is_empty()) else {
            return ToolResult::text("The current order has no items.");
        };
        let customer_id = match who.customer_id {
            Some(id) => id,
            None => self.store.get_or_create_customer(&who.first_name, &who.last_name).await,
        };

        let total = order.computed_total();
        order.total = Some(total);
        let order_id = self.store.add_order(customer_id, order.clone()).await;
        ctx.clear_slot(CURRENT_ORDER);

        let mut summary = format!("Order #{} is complete. Total: {}\nItems:\n", order_id, format_yen(total));
        for item in &order.items {
            summary.push_str(&format!(
                "- {} x {} ({} each)\n",
                item.quantity,
                item.name,
                format_yen(item.price.unwrap_or(0.0))
            ));
        }
        ToolResult::text(summary)
    }
}

pub struct GetOrderHistory {
    store: Arc<CustomerStore>,
}

impl GetOrderHistory {
    pub fn new(store: Arc<CustomerStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for GetOrderHistory {
    fn name(&self) -> &str {
        "get_order_history"
    }

    fn description(&self) -> &str {
        "Get the identified customer's past orders."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let Some(who) = identity(ctx) else {
            return ToolResult::text(IDENTIFY_FIRST);
        };
        ToolResult::text(self.store.order_history(&who.first_name, &who.last_name).await)
    }
}

pub struct ProcessReturn {
    store: Arc<CustomerStore>,
}

impl ProcessReturn {
    pub fn new(store: Arc<CustomerStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for ProcessReturn {
    fn name(&self) -> &str {
        "process_return"
    }

    fn description(&self) -> &str {
        "Return an item from one of the customer's orders."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "order_id": { "type": "integer", "description": "Order containing the item" },
                "item_name": { "type": "string", "description": "Item being returned" },
                "reason": { "type": "string", "description": "Why the item is returned" }
            },
            "required": ["order_id", "item_name", "reason"]
        })
    }

    async fn execute(&self, args: Value, ctx: &mut ToolContext<'_>) -> ToolResult {
        let Some(who) = identity(ctx) else {
            return ToolResult::text(IDENTIFY_FIRST);
        };
        let Some(order_id) = args["order_id"].as_i64() else {
            return ToolResult::error("order_id must be an integer");
        };
        let item_name = args["item_name"].as_str().unwrap_or_default().trim();
        let reason = args["reason"].as_str().unwrap_or_default().trim();

        let customer = self.store.find_customer(&who.first_name, &who.last_name).await;
        let order = match customer {
            Some(c) => self.store.order_for(c.id, order_id).await,
            None => None,
        };
        let Some(order) = order else {
            return ToolResult::text(format!(
                "Order #{} was not found for {} {}.",
                order_id, who.first_name, who.last_name
            ));
        };
        if !order.details.items.iter().any(|i| i.name.eq_ignore_ascii_case(item_name)) {
            return ToolResult::text(format!("Order #{} does not contain {}.", order_id, item_name));
        }

        self.store.record_return(order_id, item_name, reason).await;
        ToolResult::text(format!(
            "The return of {} from order #{} has been processed. Reason: {}. The refund will be issued within 3-5 business days.",
            item_name, order_id, reason
        ))
    }
}
