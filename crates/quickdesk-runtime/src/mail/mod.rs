mod webhook;

pub use webhook::WebhookMailer;
