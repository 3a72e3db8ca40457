fn main() {
    mess_oracle::cli::run();
}
