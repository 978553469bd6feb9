mod errors;
mod explain;
mod returning;
mod scenarios;
mod sources;
mod transactions;
