mod linkding;
mod remote;

pub use linkding::LinkdingClient;
pub use remote::{BookmarkPage, RemoteApi};
