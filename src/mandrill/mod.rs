pub mod api;
mod client;

pub use client::{ApiFuture, Client, Messages};
