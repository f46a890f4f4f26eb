pub mod fit_scoring;
