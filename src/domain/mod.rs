pub mod item;
pub mod source;
pub mod subscription;

pub use item::FeedItem;
pub use source::{Source, Subscriber};
pub use subscription::{Subscription, Watermark};
