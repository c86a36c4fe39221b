pub mod link;
pub mod qr;
