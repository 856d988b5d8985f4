//! Per-intent reply composition. Pure string building: CRM data, extracted
//! entities, and conversation context flow in; a customer-facing reply flows
//! out. No I/O, no randomness (phrase variation is seeded by user id so
//! identical inputs always produce identical replies).

use crate::domain::context::ConversationContext;
use crate::domain::customer::CustomerSummary;
use crate::domain::intent::Intent;
use crate::domain::message::{EntityKind, NormalizedMessage};

const ESCALATION_PHRASES: [&str; 3] = [
    "I understand your frustration. Let me connect you with one of our human agents who can provide more personalized assistance.",
    "This seems like a complex issue. I'm transferring you to a human agent who can help you better.",
    "I want to make sure you get the best possible help. Let me escalate this to our support team.",
];

const GREETINGS: [&str; 6] =
    ["hello", "hi", "hey", "good morning", "good afternoon", "good evening"];

const THANKS: [&str; 3] = ["thank", "thanks", "appreciate"];

/// Reply for a turn being handed to a human. Deterministic per user.
pub fn escalation_response(seed: &str) -> String {
    let index = seed.bytes().fold(0usize, |acc, byte| acc.wrapping_add(byte as usize));
    ESCALATION_PHRASES[index % ESCALATION_PHRASES.len()].to_string()
}

/// Reply for empty or unusable input.
pub fn clarification_response() -> String {
    "I didn't catch that. Could you tell me a bit more about what you need help with?".to_string()
}

pub fn compose(
    intent: Intent,
    normalized: &NormalizedMessage,
    customer: Option<&CustomerSummary>,
    context: &ConversationContext,
) -> String {
    match intent {
        Intent::OrderInquiry => order_inquiry(normalized, customer),
        Intent::AccountInfo => account_info(customer),
        Intent::ProductInfo => product_info(normalized),
        Intent::Billing => billing(customer),
        Intent::TechnicalSupport => technical_support(normalized),
        Intent::General => general(normalized),
        Intent::Escalate => escalation_response(&context.user_id),
    }
}

fn order_inquiry(normalized: &NormalizedMessage, customer: Option<&CustomerSummary>) -> String {
    if let Some(order_number) = normalized.first(EntityKind::OrderNumber) {
        if let Some(summary) = customer.filter(|summary| summary.contact.is_some()) {
            return match summary.matching_order(order_number) {
                Some(order) => {
                    let order_date = order
                        .order_date
                        .map(|date| date.format("%B %d, %Y").to_string())
                        .unwrap_or_else(|| "N/A".to_string());
                    format!(
                        "I found your order #{}. The current status is '{}'. Order date: {}. \
                         Is there anything specific you'd like to know about this order?",
                        order.order_number, order.status, order_date
                    )
                }
                None => format!(
                    "I couldn't find order #{order_number} in our system. Please double-check \
                     the order number or provide your email address so I can help you better."
                ),
            };
        }
        return format!(
            "To help you track order #{order_number}, I'll need your email address. Could you \
             please provide the email address associated with your account?"
        );
    }

    match customer {
        Some(summary) if !summary.recent_orders.is_empty() => format!(
            "I can help you with order information. You have {} recent orders. Could you \
             provide the specific order number you're asking about?",
            summary.recent_orders.len()
        ),
        _ => "I can help you track your orders. Could you please provide your order number \
              and the email address associated with your account?"
            .to_string(),
    }
}

fn account_info(customer: Option<&CustomerSummary>) -> String {
    match customer.and_then(|summary| summary.contact.as_ref().map(|contact| (summary, contact))) {
        Some((summary, contact)) => format!(
            "Here's your account information:\nName: {}\nEmail: {}\nPhone: {}\n\
             Customer Tier: {}\nTotal Orders: {}\n\nIs there something specific you'd like to update?",
            contact.name,
            contact.email.as_deref().unwrap_or("N/A"),
            contact.phone.as_deref().unwrap_or("N/A"),
            summary.customer_tier.as_deref().unwrap_or("Standard"),
            summary.total_orders
        ),
        None => "To access your account information, I'll need to verify your identity. \
                 Could you please provide the email address associated with your account?"
            .to_string(),
    }
}

fn product_info(normalized: &NormalizedMessage) -> String {
    match normalized.first(EntityKind::Product) {
        Some(product) => {
            let product = title_case(product);
            format!(
                "I can help you with information about {product}. Here are some common questions:\n\n\
                 \u{2022} Product specifications and features\n\
                 \u{2022} Pricing and availability\n\
                 \u{2022} Compatibility and requirements\n\
                 \u{2022} Warranty information\n\n\
                 What specific information would you like to know about {product}?"
            )
        }
        None => "I can help you find product information. What product are you interested in \
                 learning about?"
            .to_string(),
    }
}

fn billing(customer: Option<&CustomerSummary>) -> String {
    match customer.filter(|summary| summary.contact.is_some()) {
        Some(summary) => format!(
            "I can help you with billing questions. Based on your account, I can see you have \
             {} orders on record.\n\nFor detailed billing information and payment history, I can:\n\
             \u{2022} Help you understand charges on your recent orders\n\
             \u{2022} Provide information about payment methods\n\
             \u{2022} Assist with refund requests\n\n\
             What specific billing question can I help you with?",
            summary.total_orders
        ),
        None => "I can help you with billing questions. To access your billing information, \
                 I'll need to verify your account. Could you provide your email address?"
            .to_string(),
    }
}

fn technical_support(normalized: &NormalizedMessage) -> String {
    match normalized.first(EntityKind::Product) {
        Some(product) => {
            let product = title_case(product);
            format!(
                "I can help troubleshoot issues with your {product}. Here are some quick solutions:\n\n\
                 \u{2022} Try restarting the device\n\
                 \u{2022} Check for software updates\n\
                 \u{2022} Verify all connections are secure\n\n\
                 Could you describe the specific issue you're experiencing with your {product}?"
            )
        }
        None => "I'm here to help with technical issues. Could you please describe:\n\n\
                 \u{2022} What product or service you're having trouble with\n\
                 \u{2022} What specific problem you're experiencing\n\
                 \u{2022} Any error messages you're seeing\n\n\
                 This will help me provide the best assistance."
            .to_string(),
    }
}

fn general(normalized: &NormalizedMessage) -> String {
    let text = normalized.cleaned_text.as_str();

    if GREETINGS.iter().any(|greeting| text.contains(greeting)) {
        return "Hello! I'm your customer support assistant. I can help you with:\n\n\
                \u{2022} Order tracking and delivery information\n\
                \u{2022} Account information and updates\n\
                \u{2022} Product information and specifications\n\
                \u{2022} Billing and payment questions\n\
                \u{2022} Technical support\n\n\
                How can I assist you today?"
            .to_string();
    }

    if THANKS.iter().any(|thank| text.contains(thank)) {
        return "You're welcome! Is there anything else I can help you with today?".to_string();
    }

    "I'm here to help! I can assist you with orders, account information, products, billing, \
     and technical support. Could you please let me know what you need help with?"
        .to_string()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{compose, escalation_response};
    use crate::domain::context::ConversationContext;
    use crate::domain::customer::{CrmContact, CrmOrder, CustomerSummary};
    use crate::domain::intent::Intent;
    use crate::domain::message::NormalizedMessage;
    use crate::normalize::Normalizer;

    fn context() -> ConversationContext {
        ConversationContext::empty("user-1")
    }

    fn summary_with_order(order_number: &str) -> CustomerSummary {
        CustomerSummary {
            contact: Some(CrmContact {
                id: "C-1".to_string(),
                name: "Jane Doe".to_string(),
                email: Some("jane@example.com".to_string()),
                phone: None,
            }),
            recent_orders: vec![CrmOrder {
                order_number: order_number.to_string(),
                status: "Shipped".to_string(),
                order_date: Some(Utc::now()),
            }],
            open_cases: Vec::new(),
            customer_tier: Some("Gold".to_string()),
            total_orders: 7,
        }
    }

    #[test]
    fn escalation_response_is_deterministic_per_user() {
        assert_eq!(escalation_response("user-1"), escalation_response("user-1"));
    }

    #[test]
    fn order_inquiry_with_matching_crm_order_reports_status() {
        let normalizer = Normalizer::default();
        let normalized = normalizer.normalize("where is my order #12345");
        let summary = summary_with_order("ORD-12345");

        let reply = compose(Intent::OrderInquiry, &normalized, Some(&summary), &context());
        assert!(reply.contains("ORD-12345"));
        assert!(reply.contains("Shipped"));
    }

    #[test]
    fn order_inquiry_without_crm_asks_for_email() {
        let normalizer = Normalizer::default();
        let normalized = normalizer.normalize("where is my order #12345");

        let reply = compose(Intent::OrderInquiry, &normalized, None, &context());
        assert!(reply.contains("order #12345"));
        assert!(reply.contains("email address"));
        assert!(!reply.contains("Shipped"), "no CRM data, no order-specific detail");
    }

    #[test]
    fn order_inquiry_with_unknown_number_suggests_double_checking() {
        let normalizer = Normalizer::default();
        let normalized = normalizer.normalize("where is my order #99999");
        let summary = summary_with_order("ORD-12345");

        let reply = compose(Intent::OrderInquiry, &normalized, Some(&summary), &context());
        assert!(reply.contains("couldn't find order #99999"));
    }

    #[test]
    fn account_info_renders_contact_card_when_known() {
        let normalized = NormalizedMessage::default();
        let summary = summary_with_order("ORD-1");

        let reply = compose(Intent::AccountInfo, &normalized, Some(&summary), &context());
        assert!(reply.contains("Jane Doe"));
        assert!(reply.contains("Gold"));
        assert!(reply.contains("Total Orders: 7"));
    }

    #[test]
    fn technical_support_names_the_product_when_extracted() {
        let normalizer = Normalizer::default();
        let normalized = normalizer.normalize("my laptop is broken");

        let reply = compose(Intent::TechnicalSupport, &normalized, None, &context());
        assert!(reply.contains("Laptop"));
    }

    #[test]
    fn general_greeting_gets_the_capabilities_reply() {
        let normalizer = Normalizer::default();
        let normalized = normalizer.normalize("hello there");

        let reply = compose(Intent::General, &normalized, None, &context());
        assert!(reply.contains("How can I assist you today?"));
    }

    #[test]
    fn general_thanks_gets_the_closing_reply() {
        let normalizer = Normalizer::default();
        let normalized = normalizer.normalize("thanks a lot");

        let reply = compose(Intent::General, &normalized, None, &context());
        assert!(reply.starts_with("You're welcome!"));
    }
}
