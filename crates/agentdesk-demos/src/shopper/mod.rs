//! Personal shopper: reception identifies the customer and routes them to
//! sales or returns.

mod store;
mod tools;

pub use store::{format_yen, Customer, CustomerStore, Order, OrderDetails, OrderItem, ReturnRecord};
pub use tools::{
    AddItemToOrder, CompleteOrder, GetOrderHistory, IdentifyCustomer, ProcessReturn, StartOrder,
    CURRENT_ORDER, CUSTOMER_ID, FIRST_NAME, LAST_NAME,
};

use crate::prompts::{self, load_prompt};
use agentdesk_agent::{AgentDefinition, Desk, Reasoner, RouterConfig};
use agentdesk_core::Result;
use std::sync::Arc;

pub const TRIAGE: &str = "triage";
pub const SALES: &str = "sales";
pub const RETURNS: &str = "returns";

pub fn agents() -> Result<Vec<AgentDefinition>> {
    let triage = load_prompt("shopper/triage", prompts::SHOPPER_TRIAGE)?;
    let sales = load_prompt("shopper/sales", prompts::SHOPPER_SALES)?;
    let returns = load_prompt("shopper/returns", prompts::SHOPPER_RETURNS)?;

    Ok(vec![
        AgentDefinition::new(TRIAGE, triage.instructions)
            .with_description(triage.description)
            .with_tool("identify_customer")
            .with_handoffs([SALES, RETURNS]),
        AgentDefinition::new(SALES, sales.instructions)
            .with_description(sales.description)
            .with_tools(["identify_customer", "start_order", "add_item_to_order", "complete_order"])
            .with_handoffs([TRIAGE, RETURNS]),
        AgentDefinition::new(RETURNS, returns.instructions)
            .with_description(returns.description)
            .with_tools(["identify_customer", "get_order_history", "process_return"])
            .with_handoffs([TRIAGE, SALES]),
    ])
}

pub fn desk(store: Arc<CustomerStore>, config: RouterConfig, reasoner: Arc<dyn Reasoner>) -> Result<Desk> {
    let mut builder = Desk::builder("shopper")
        .tool(IdentifyCustomer::new(store.clone()))?
        .tool(StartOrder)?
        .tool(AddItemToOrder)?
        .tool(CompleteOrder::new(store.clone()))?
        .tool(GetOrderHistory::new(store.clone()))?
        .tool(ProcessReturn::new(store))?;
    for agent in agents()? {
        builder = builder.agent(agent)?;
    }
    builder.entry(TRIAGE).config(config).build(reasoner)
}
