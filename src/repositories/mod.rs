pub mod price_history_repository;

pub use price_history_repository::PriceHistoryRepository;
