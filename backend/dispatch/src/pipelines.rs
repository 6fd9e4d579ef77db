//! Prompt templates for every stage the handlers run.

use concierge_agent::PromptTemplate;

/// Memory-free: find the categories and products a query mentions.
pub fn product_reasoning() -> PromptTemplate {
    PromptTemplate::new(
        "
        You are a product identification system for an electronics store.
        Your task is to analyze customer service queries and identify mentioned products and categories.

        Available categories:
        {categories}

        Available products:
        {products}

        {format_instructions}

        Ensure your response follows the exact format specified in the instructions.
        ",
        "Customer Query: {customer_input}",
    )
}

pub const PRODUCT_QUERY_EXAMPLE: &str =
    r#"{"results": [{"category": "Computers and Laptops", "products": ["BlueWave Gaming Laptop"]}]}"#;

/// Memory-attached: answer a product question from the looked-up records.
pub fn product_response() -> PromptTemplate {
    PromptTemplate::new(
        "
        You are a friendly and helpful customer service assistant for a large electronics store.
        Follow these guidelines:
        1. Provide concise, helpful responses
        2. Ask relevant follow-up questions when needed
        3. Show understanding of specific products mentioned
        4. Be professional but conversational in tone
        5. Focus on solving the customer's immediate needs
        ",
        "
        Product Information from Query:
        {product_info}

        Customer Query: {customer_input}
        ",
    )
}

/// Memory-attached: the order agent's tool-calling instructions.
pub fn order_agent() -> PromptTemplate {
    PromptTemplate::new(
        r#"
        You are now connected to the e-commerce database. You can use the following tools to interact with the database:

        {tools}

        The user_id is
        {customer_id}

        Answer with exactly one JSON object and nothing else:
        - to use a tool: {"action": "tool", "tool": "<tool name>", "arguments": {}}
        - to answer the customer: {"action": "final", "output": "<your answer>"}

        If none of the above tools are needed, you can answer the customer in a polite manner.
        "#,
        "Customer Query: {customer_input}",
    )
}

/// Memory-attached: is this message small talk?
pub fn chitchat_check() -> PromptTemplate {
    PromptTemplate::new(
        "
        You are the first line of a customer service assistant for an electronics store.
        Decide whether the customer message is chit-chat (greetings, thanks, small talk,
        or anything unrelated to the store) or a request matching one of these intentions:
        {possible_intentions}

        Use the conversation so far to resolve follow-up messages.

        {format_instructions}
        ",
        "Customer Query: {customer_input}",
    )
}

pub const CHITCHAT_CHECK_EXAMPLE: &str = r#"{"chitchat": true}"#;

/// Memory-attached: pick the intention a non-chit-chat message belongs to.
pub fn router() -> PromptTemplate {
    PromptTemplate::new(
        "
        You route customer messages for an electronics store.
        Choose the single intention that best matches the customer message.

        Possible intentions:
        {possible_intentions}

        Use the conversation so far to resolve follow-up messages.

        {format_instructions}
        ",
        "Customer Query: {customer_input}",
    )
}

pub const ROUTER_EXAMPLE: &str = r#"{"intent": "Order Status"}"#;

/// Memory-attached: conversational reply with no store data.
pub fn chitchat_response() -> PromptTemplate {
    PromptTemplate::new(
        "
        You are a friendly customer service assistant for a large electronics store.
        Reply briefly and warmly to the customer's small talk. Do not invent product,
        price or order details; offer help with products and orders instead.
        ",
        "Customer Query: {customer_input}",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_declare_expected_variables() {
        assert_eq!(
            product_reasoning().placeholders(),
            vec!["categories", "customer_input", "format_instructions", "products"]
        );
        assert_eq!(product_response().placeholders(), vec!["customer_input", "product_info"]);
        assert_eq!(
            order_agent().placeholders(),
            vec!["customer_id", "customer_input", "tools"]
        );
        assert_eq!(
            router().placeholders(),
            vec!["customer_input", "format_instructions", "possible_intentions"]
        );
        assert_eq!(chitchat_response().placeholders(), vec!["customer_input"]);
    }
}
