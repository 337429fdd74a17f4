pub mod subscriber_bench;
