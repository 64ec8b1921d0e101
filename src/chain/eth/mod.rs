//! Ethereum chain adapter and block processor, built on `alloy`.

pub mod adapter;
pub mod processor;

pub use adapter::EthChainAdapter;
pub use processor::EthBlockProcessor;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn adapter_and_processor_are_send_sync() {
        assert_send_sync::<EthChainAdapter>();
        assert_send_sync::<EthBlockProcessor>();
    }
}
