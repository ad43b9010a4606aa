/// Loads variables from a `.env` file into the process environment when one
/// is present; missing files are not an error.
pub fn load_dotenvy_vars_if_present() {
    dotenvy::dotenv().ok();
}
