use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reply to `GET /chat/start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueStart {
    pub session_id: String,
    /// Greeting to speak
    #[serde(rename = "message")]
    pub greeting: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerRequest<'a> {
    pub session_id: &'a str,
    pub answer: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_question: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendOffersEmailRequest<'a> {
    pub session_id: &'a str,
    pub email: &'a str,
    pub message: &'a str,
}

/// `availableActions` arrives either as a list or as a single string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AvailableActions {
    List(Vec<String>),
    Single(String),
}

impl AvailableActions {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let items: Vec<&str> = match self {
            Self::List(items) => items.iter().map(String::as_str).collect(),
            Self::Single(item) => vec![item.as_str()],
        };
        items.into_iter()
    }
}

/// Side-channel action requested by a finished conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NextAction {
    Email,
    DisplayOffers,
    #[default]
    None,
}

impl NextAction {
    /// Email wins over display; anything mentioning offers, results or
    /// display maps to `DisplayOffers`.
    pub fn from_actions(actions: Option<&AvailableActions>) -> Self {
        let Some(actions) = actions else {
            return Self::None;
        };

        let lowered: Vec<String> = actions.iter().map(str::to_lowercase).collect();
        if lowered.iter().any(|a| a.contains("email") || a.contains("e-mail")) {
            Self::Email
        } else if lowered
            .iter()
            .any(|a| a.contains("offer") || a.contains("result") || a.contains("display"))
        {
            Self::DisplayOffers
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::DisplayOffers => "display-offers",
            Self::None => "none",
        }
    }
}

/// Raw reply to `POST /chat/answer`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub current_state: Option<String>,
    #[serde(default)]
    pub available_actions: Option<AvailableActions>,
    #[serde(default)]
    pub credit_information: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub question_number: Option<u32>,
    #[serde(default)]
    pub total_questions: Option<u32>,
}

/// One dialogue turn outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueResult {
    pub session_id: String,
    /// Next assistant prompt
    #[serde(rename = "question")]
    pub prompt_text: String,
    pub is_completed: bool,
    pub next_action: NextAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_actions: Option<AvailableActions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_questions: Option<u32>,
}

impl DialogueResult {
    /// Plain continuation result, mostly for tests and stubs.
    pub fn reply(session_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            prompt_text: prompt.into(),
            is_completed: false,
            next_action: NextAction::None,
            structured_data: None,
            current_state: None,
            available_actions: None,
            category: None,
            question_number: None,
            total_questions: None,
        }
    }

    pub fn completed(mut self, next_action: NextAction) -> Self {
        self.is_completed = true;
        self.next_action = next_action;
        self
    }

    pub(crate) fn from_response(
        response: AnswerResponse,
        session_id: &str,
        completion_phrases: &[String],
    ) -> Self {
        let is_completed = response.is_completed
            || completion_phrases
                .iter()
                .any(|phrase| !phrase.is_empty() && response.question.contains(phrase.as_str()));

        Self {
            session_id: response
                .session_id
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| session_id.to_string()),
            next_action: NextAction::from_actions(response.available_actions.as_ref()),
            prompt_text: response.question,
            is_completed,
            structured_data: response.credit_information.filter(|v| !v.is_null()),
            current_state: response.current_state,
            available_actions: response.available_actions,
            category: response.category,
            question_number: response.question_number,
            total_questions: response.total_questions,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferCost {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One mortgage offer. Unknown fields are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<Bank>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_installment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<OfferCost>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Offer {
    pub fn bank_name(&self) -> Option<&str> {
        self.bank.as_ref()?.name.as_deref()
    }

    pub fn monthly_payment(&self) -> Option<f64> {
        self.monthly_installment.or(self.installment)
    }

    pub fn total_cost(&self) -> Option<f64> {
        let cost = self.cost.as_ref()?;
        cost.total_cost.or(cost.total)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct OffersResponse {
    #[serde(default)]
    pub offers: OfferItems,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct OfferItems {
    #[serde(default)]
    pub items: Vec<Offer>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_next_action_mapping() {
        let email = AvailableActions::List(vec!["showOffers".into(), "sendEmail".into()]);
        assert_eq!(NextAction::from_actions(Some(&email)), NextAction::Email);

        let display = AvailableActions::Single("display_results".into());
        assert_eq!(NextAction::from_actions(Some(&display)), NextAction::DisplayOffers);

        let other = AvailableActions::List(vec!["restart".into()]);
        assert_eq!(NextAction::from_actions(Some(&other)), NextAction::None);
        assert_eq!(NextAction::from_actions(None), NextAction::None);
    }

    #[test]
    fn test_available_actions_accepts_string_or_list() {
        let single: AvailableActions = serde_json::from_value(json!("email")).unwrap();
        assert_eq!(single, AvailableActions::Single("email".into()));

        let list: AvailableActions = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_result_from_response() {
        let response: AnswerResponse = serde_json::from_value(json!({
            "sessionId": "s1",
            "question": "How much?",
            "isCompleted": false,
            "currentState": "amount",
            "creditInformation": {"amount": 300000}
        }))
        .unwrap();

        let result = DialogueResult::from_response(response, "s1", &[]);
        assert_eq!(result.prompt_text, "How much?");
        assert!(!result.is_completed);
        assert_eq!(result.next_action, NextAction::None);
        assert_eq!(result.structured_data, Some(json!({"amount": 300000})));
        assert_eq!(result.current_state.as_deref(), Some("amount"));
    }

    #[test]
    fn test_completion_phrase_marks_completed() {
        let response: AnswerResponse = serde_json::from_value(json!({
            "question": "Dziękuję. Analizuję Twoje dane i przygotowuję oferty.",
            "creditInformation": null
        }))
        .unwrap();

        let phrases = vec!["Analizuję Twoje dane i przygotowuję oferty".to_string()];
        let result = DialogueResult::from_response(response, "s9", &phrases);
        assert!(result.is_completed);
        assert_eq!(result.session_id, "s9");
        assert!(result.structured_data.is_none());
    }

    #[test]
    fn test_result_serializes_question() {
        let json = serde_json::to_value(
            DialogueResult::reply("s1", "Done").completed(NextAction::DisplayOffers),
        )
        .unwrap();
        assert_eq!(json["question"], "Done");
        assert_eq!(json["isCompleted"], true);
        assert_eq!(json["nextAction"], "display-offers");
    }

    #[test]
    fn test_offer_accessors_and_passthrough() {
        let offer: Offer = serde_json::from_value(json!({
            "bank": {"name": "Bank A", "logo": "a.png"},
            "title": "Fixed 5y",
            "installment": 2100.5,
            "cost": {"total": 410000.0},
            "currencyIndex": {"value": 5.8}
        }))
        .unwrap();

        assert_eq!(offer.bank_name(), Some("Bank A"));
        assert_eq!(offer.monthly_payment(), Some(2100.5));
        assert_eq!(offer.total_cost(), Some(410000.0));

        let back = serde_json::to_value(&offer).unwrap();
        assert_eq!(back["currencyIndex"]["value"], 5.8);
        assert_eq!(back["bank"]["logo"], "a.png");
    }
}
