mod sdp_exchange;

pub use sdp_exchange::NonTrickleSdpExchange;
