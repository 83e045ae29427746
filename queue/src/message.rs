//! Messages as seen by handlers and deliveries as seen by the consumer

/// Opaque broker handle used to settle one delivery
///
/// Consumed by acknowledge/reject; never retained past settlement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryTag(String);

impl DeliveryTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload handed to a [`crate::MessageHandler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    body: Vec<u8>,
    destination: String,
    redelivered: bool,
    delivery_count: u32,
}

impl Message {
    pub fn new(destination: impl Into<String>, body: Vec<u8>, redelivered: bool) -> Self {
        Self {
            body,
            destination: destination.into(),
            redelivered,
            delivery_count: if redelivered { 2 } else { 1 },
        }
    }

    /// Set the broker-reported number of deliveries, this one included
    pub fn with_delivery_count(mut self, count: u32) -> Self {
        self.delivery_count = count.max(1);
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Whether the broker delivered this message before without a settlement
    pub fn is_redelivered(&self) -> bool {
        self.redelivered
    }

    /// How many times the broker handed this message out, this one included
    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }
}

/// A received message together with the handle that settles it
#[derive(Debug)]
pub struct Delivery {
    message: Message,
    tag: DeliveryTag,
}

impl Delivery {
    pub fn new(message: Message, tag: DeliveryTag) -> Self {
        Self { message, tag }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn tag(&self) -> &DeliveryTag {
        &self.tag
    }

    pub fn into_parts(self) -> (Message, DeliveryTag) {
        (self.message, self.tag)
    }
}
