//! Carries tokens through the page address: shareable links out, pasted
//! links or bare tokens in.

use url::Url;

use crate::descriptor::DescriptorKind;

const OFFER: &str = "offer";
const ANSWER: &str = "answer";

fn param_name(kind: DescriptorKind) -> &'static str {
    match kind {
        DescriptorKind::Offer => OFFER,
        DescriptorKind::Answer => ANSWER,
    }
}

fn find_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Returns the token carried by `text`, which may be a bare token or a full
/// shared link.
pub fn extract_token(text: &str) -> String {
    let trimmed = text.trim();
    let Ok(url) = Url::parse(trimmed) else {
        return trimmed.to_owned();
    };
    find_param(&url, OFFER)
        .or_else(|| find_param(&url, ANSWER))
        .unwrap_or_else(|| trimmed.to_owned())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IncomingToken {
    pub offer: Option<String>,
    pub answer: Option<String>,
}

impl IncomingToken {
    pub fn into_token(self) -> Option<String> {
        self.offer.or(self.answer)
    }
}

/// The visible page location.
#[derive(Clone, Debug)]
pub struct AddressBar {
    location: Url,
}

impl AddressBar {
    pub fn new(location: Url) -> Self {
        Self { location }
    }

    pub fn parse(location: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(location)?))
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    /// The current location with any previous offer/answer replaced by `token`.
    pub fn build_shareable_url(&self, token: &str, kind: DescriptorKind) -> Url {
        let mut url = self.location.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != OFFER && key != ANSWER)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .append_pair(param_name(kind), token);
        url
    }

    /// Reads the startup token, then scrubs it so a reload does not replay it.
    pub fn read_incoming_token(&mut self) -> IncomingToken {
        let incoming = IncomingToken {
            offer: find_param(&self.location, OFFER),
            answer: find_param(&self.location, ANSWER),
        };
        if incoming.offer.is_some() || incoming.answer.is_some() {
            self.clear_params();
        }
        incoming
    }

    pub fn clear_params(&mut self) {
        self.location.set_query(None);
    }
}
