pub mod compile;
pub mod dump;
pub mod run;
pub mod unit_loader;

#[cfg(test)]
mod run_tests;
#[cfg(test)]
mod unit_loader_tests;
