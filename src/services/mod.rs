// 服务模块
// 文档存储后端、题库读取、练习状态同步与纯函数视图

pub mod store;
pub mod memory;
pub mod database;
pub mod firestore;
pub mod catalog;
pub mod practiced;
pub mod grouping;
pub mod selector;

pub use store::{DocumentStore, StoreLayout};
pub use memory::MemoryDocumentStore;
pub use database::SqliteDocumentStore;
pub use firestore::{FirestoreSettings, FirestoreStore};
pub use catalog::CatalogAccessor;
pub use practiced::{Clock, FixedClock, PracticedSync, PracticedTransition, SystemClock};
pub use grouping::group_by_topic;
pub use selector::pick_random_unpracticed;
