//! Pull-point event operations.
//!
//! `CreatePullPointSubscription` goes to the events service found in the
//! endpoint table. `PullMessages` has to be sent to the subscription address
//! returned by the device, so it is dispatched with a redirect URL.

use super::{Method, Operation};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename = "tev:CreatePullPointSubscription")]
pub struct CreatePullPointSubscription {
    /// ISO 8601 duration, e.g. `PT60S`
    #[serde(
        rename = "tev:InitialTerminationTime",
        skip_serializing_if = "Option::is_none"
    )]
    pub initial_termination_time: Option<String>,
}

impl Operation for CreatePullPointSubscription {
    const SERVICE: &'static str = "event";
    const NAME: &'static str = "CreatePullPointSubscription";
}

impl Method for CreatePullPointSubscription {
    type Response = CreatePullPointSubscriptionResponse;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePullPointSubscriptionResponse {
    #[serde(rename = "SubscriptionReference", default)]
    pub subscription_reference: SubscriptionReference,
    #[serde(rename = "CurrentTime", default)]
    pub current_time: String,
    #[serde(rename = "TerminationTime", default)]
    pub termination_time: String,
}

impl Operation for CreatePullPointSubscriptionResponse {
    const SERVICE: &'static str = "event";
    const NAME: &'static str = "CreatePullPointSubscriptionResponse";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionReference {
    #[serde(rename = "Address", default)]
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename = "tev:PullMessages")]
pub struct PullMessages {
    #[serde(rename = "tev:Timeout")]
    pub timeout: String,
    #[serde(rename = "tev:MessageLimit")]
    pub message_limit: u32,
}

impl Default for PullMessages {
    fn default() -> Self {
        PullMessages {
            timeout: "PT5S".to_string(),
            message_limit: 10,
        }
    }
}

impl Operation for PullMessages {
    const SERVICE: &'static str = "event";
    const NAME: &'static str = "PullMessages";
}

impl Method for PullMessages {
    type Response = PullMessagesResponse;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullMessagesResponse {
    #[serde(rename = "CurrentTime", default)]
    pub current_time: String,
    #[serde(rename = "TerminationTime", default)]
    pub termination_time: String,
    #[serde(rename = "NotificationMessage", default)]
    pub messages: Vec<NotificationMessage>,
}

impl Operation for PullMessagesResponse {
    const SERVICE: &'static str = "event";
    const NAME: &'static str = "PullMessagesResponse";
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationMessage {
    #[serde(rename = "Topic", default)]
    pub topic: Option<Topic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topic {
    #[serde(rename = "$text", default)]
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_subscription_request() {
        let xml = quick_xml::se::to_string(&CreatePullPointSubscription::default()).unwrap();
        assert!(!xml.contains("InitialTerminationTime"));
    }

    #[test]
    fn pull_messages_topics() {
        let body = r#"<tev:PullMessagesResponse>
            <tev:CurrentTime>2024-01-01T00:00:00Z</tev:CurrentTime>
            <tev:TerminationTime>2024-01-01T00:01:00Z</tev:TerminationTime>
            <wsnt:NotificationMessage>
                <wsnt:Topic Dialect="http://www.onvif.org/ver10/tev/topicExpression/ConcreteSet">tns1:RuleEngine/CellMotionDetector/Motion</wsnt:Topic>
                <wsnt:Message><tt:Message UtcTime="2024-01-01T00:00:00Z"/></wsnt:Message>
            </wsnt:NotificationMessage>
        </tev:PullMessagesResponse>"#;

        let resp: PullMessagesResponse = quick_xml::de::from_str(body).unwrap();
        assert_eq!(resp.messages.len(), 1);
        assert_eq!(
            resp.messages[0].topic.as_ref().unwrap().value,
            "tns1:RuleEngine/CellMotionDetector/Motion"
        );
    }
}
