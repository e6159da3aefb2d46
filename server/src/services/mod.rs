pub mod demo_feed;
pub mod lot_poller;
