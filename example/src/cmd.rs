pub mod run;
pub mod subscribe;
pub mod unsubscribe;
