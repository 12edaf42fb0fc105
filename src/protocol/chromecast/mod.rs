mod client;
mod proto;
mod tls;
mod varint;

pub use client::ChromecastClient;
