pub mod intruder;
