// Report generation: the generate endpoint, the stateless preview endpoint,
// and DingTalk forwarding of stored reports.
pub mod handlers;
