//! The jobs: one module per source.
//!
//! Listing jobs implement [`Listing`](crate::pipeline::Listing) and run
//! through the shared [`Pipeline`](crate::pipeline::Pipeline): pages are
//! fetched in parallel, parsed, filtered against the job's state document
//! and announced one message at a time.
//!
//! # Supported Sources
//!
//! | Job | Module | Source | Notes |
//! |-----|--------|--------|-------|
//! | events | [`events`] | kontramarka.ua HTML | Three categories, next seven days only |
//! | flats | [`flats`] | novostroyki.lun.ua HTML | Developer site decoded from redirect links |
//! | goal | [`goal`] | goalhd.net HTML | Two leagues, relative Russian dates |
//! | kino | [`kino`] | planetakino.ua XML feed | Optional OMDb and YouTube decoration |
//! | me | [`me`] | OpenWeatherMap, kurs.com.ua, CoinDesk | Daily digest, no state |

pub mod events;
pub mod flats;
pub mod goal;
pub mod kino;
pub mod me;
